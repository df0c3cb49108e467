//! Key Management for timelock
//!
//! One random AES-256 key per lock. The key is written to disk before the
//! file is encrypted and removed only after a successful decrypt, so an
//! encrypted file never exists without its key.

use crate::crypto::KEY_SIZE;
use crate::error::{Error, Result};
use crate::fsutil::{remove_if_exists, write_atomic};
use crate::slot::Slot;
use rand::RngCore;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// File name of the key in single-slot mode
pub const KEY_FILE_NAME: &str = "file_key.key";

/// Directory holding per-file keys
pub const KEYS_DIR_NAME: &str = "keys";

/// Symmetric key for one locked file
pub struct EncryptionKey {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl EncryptionKey {
    /// Generate a fresh key from the OS CSPRNG
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::rngs::OsRng.fill_bytes(&mut key[..]);
        EncryptionKey { key }
    }

    /// Build from raw key material
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::InvalidKeyLength {
                expected: KEY_SIZE,
                got: bytes.len(),
            });
        }
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(EncryptionKey { key })
    }

    /// Get the raw key bytes
    pub fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Filesystem-backed key store
pub struct KeyStore {
    state_dir: PathBuf,
}

impl KeyStore {
    /// Create a key store rooted at `state_dir`
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        KeyStore {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    /// Location of the key file for a slot
    pub fn key_path(&self, slot: &Slot) -> PathBuf {
        match slot {
            Slot::Global => self.state_dir.join(KEY_FILE_NAME),
            Slot::File(id) => self
                .state_dir
                .join(KEYS_DIR_NAME)
                .join(format!("{}.key", id)),
        }
    }

    /// Produce a fresh key
    pub fn generate(&self) -> EncryptionKey {
        EncryptionKey::generate()
    }

    /// Persist a key, replacing any key already in the slot
    pub fn save(&self, slot: &Slot, key: &EncryptionKey) -> Result<()> {
        let path = self.key_path(slot);
        write_atomic(&path, key.bytes(), true)?;
        debug!("Saved key for slot {} to {:?}", slot, path);
        Ok(())
    }

    /// Load the key for a slot
    pub fn load(&self, slot: &Slot) -> Result<EncryptionKey> {
        let path = self.key_path(slot);
        let bytes = match fs::read(&path) {
            Ok(b) => Zeroizing::new(b),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::KeyNotFound),
            Err(e) => return Err(e.into()),
        };
        EncryptionKey::from_slice(&bytes)
    }

    /// Whether a key is stored for the slot
    pub fn exists(&self, slot: &Slot) -> bool {
        self.key_path(slot).is_file()
    }

    /// Delete the key for a slot; succeeds if it is already gone
    pub fn purge(&self, slot: &Slot) -> Result<()> {
        let path = self.key_path(slot);
        if remove_if_exists(&path)? {
            debug!("Purged key for slot {}", slot);
        }
        Ok(())
    }
}
