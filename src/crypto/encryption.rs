//! AES-256-GCM Encryption Implementation
//!
//! Locked files are sealed with AES-256-GCM which provides:
//! - Confidentiality: Data is encrypted
//! - Integrity: Any tampering is detected
//! - Authentication: Verifies the data came from the key holder
//!
//! Files are read fully into memory and replaced in place. There is no
//! streaming mode, so memory use grows with the size of the locked file.

use crate::crypto::{EncryptionKey, FILE_AAD, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result};
use crate::fsutil::write_atomic;
use rand::RngCore;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Encrypted data container with nonce and authentication tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Nonce used for encryption (unique per encryption)
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with appended authentication tag
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Get the total size of encrypted data
    pub fn size(&self) -> usize {
        self.nonce.len() + self.ciphertext.len()
    }

    /// Serialize to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Deserialize from bytes
    ///
    /// Anything shorter than a nonce plus a tag cannot have been produced by
    /// `encrypt`, so it is reported as an authentication failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::AuthenticationFailure);
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);

        Ok(EncryptedData {
            nonce,
            ciphertext: bytes[NONCE_SIZE..].to_vec(),
        })
    }
}

fn aead_key(key: &[u8; KEY_SIZE]) -> Result<LessSafeKey> {
    let unbound_key = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| Error::Encryption("Failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound_key))
}

/// Encrypt data using AES-256-GCM
///
/// Works for any plaintext length, including empty input.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<EncryptedData> {
    let sealing_key = aead_key(key.bytes())?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    in_out.reserve(TAG_SIZE);

    sealing_key
        .seal_in_place_append_tag(nonce, Aad::from(FILE_AAD), &mut in_out)
        .map_err(|_| Error::Encryption("Encryption failed".to_string()))?;

    Ok(EncryptedData {
        nonce: nonce_bytes,
        ciphertext: in_out,
    })
}

/// Decrypt data using AES-256-GCM
///
/// Returns `AuthenticationFailure` if the tag does not verify.
pub fn decrypt(key: &EncryptionKey, encrypted: &EncryptedData) -> Result<Vec<u8>> {
    if encrypted.ciphertext.len() < TAG_SIZE {
        return Err(Error::AuthenticationFailure);
    }

    let opening_key = aead_key(key.bytes())?;
    let nonce = Nonce::assume_unique_for_key(encrypted.nonce);

    let mut in_out = encrypted.ciphertext.clone();
    let plaintext = opening_key
        .open_in_place(nonce, Aad::from(FILE_AAD), &mut in_out)
        .map_err(|_| Error::AuthenticationFailure)?;

    Ok(plaintext.to_vec())
}

/// Replace a file's contents with its sealed form
pub fn encrypt_file(path: &Path, key: &EncryptionKey) -> Result<()> {
    let plaintext = fs::read(path)?;
    let sealed = encrypt(key, &plaintext)?;
    write_atomic(path, &sealed.to_bytes(), false)?;
    debug!(
        "Encrypted {:?}: {} -> {} bytes",
        path,
        plaintext.len(),
        sealed.size()
    );
    Ok(())
}

/// Replace a sealed file with its plaintext
///
/// The file is left untouched when authentication fails.
pub fn decrypt_file(path: &Path, key: &EncryptionKey) -> Result<()> {
    let bytes = fs::read(path)?;
    let sealed = EncryptedData::from_bytes(&bytes)?;
    let plaintext = decrypt(key, &sealed)?;
    write_atomic(path, &plaintext, false)?;
    debug!("Decrypted {:?}: {} bytes", path, plaintext.len());
    Ok(())
}
