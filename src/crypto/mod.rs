//! Cryptography module for timelock
//!
//! Provides AES-256-GCM authenticated encryption of whole files and the
//! on-disk key store that holds the key between lock and unlock.

mod encryption;
mod keys;

pub use encryption::{decrypt, decrypt_file, encrypt, encrypt_file, EncryptedData};
pub use keys::{EncryptionKey, KeyStore};

/// Size of AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Associated data bound to every sealed file
pub const FILE_AAD: &[u8] = b"timelock-file-v1";
