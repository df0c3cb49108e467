//! Lock controller
//!
//! Write ordering:
//! 1. trusted time is fetched before anything is written, so an unreachable
//!    time source leaves no state behind;
//! 2. the key and the lock record are persisted before the file is
//!    encrypted, so an encrypted file always has its key;
//! 3. key and record are removed only after a successful decrypt.
//!
//! Nothing serializes concurrent invocations. Two processes racing on the
//! same slot can interleave their writes.

use crate::config::{Config, SlotMode};
use crate::crypto::{decrypt, decrypt_file, encrypt_file, EncryptedData, KeyStore};
use crate::error::{Error, Result};
use crate::lock::{LockReceipt, LockStatus, UnlockReceipt};
use crate::metadata::{LockMetadataStore, LockRecord};
use crate::slot::Slot;
use crate::time::TimeSource;
use chrono::Duration;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Longest accepted lock duration: 100 years
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// A target file resolved to its canonical identity
struct Target {
    canonical: PathBuf,
    file_path: String,
    slot: Slot,
}

/// Orchestrates lock and unlock against a trusted time source
pub struct LockController<T: TimeSource> {
    mode: SlotMode,
    keys: KeyStore,
    records: LockMetadataStore,
    clock: T,
}

impl<T: TimeSource> LockController<T> {
    /// Create a controller using the configured state directory and slot mode
    pub fn new(config: &Config, clock: T) -> Self {
        Self::with_stores(
            config.slot_mode,
            KeyStore::new(&config.state_dir),
            LockMetadataStore::new(&config.state_dir),
            clock,
        )
    }

    /// Create a controller from explicit stores
    pub fn with_stores(
        mode: SlotMode,
        keys: KeyStore,
        records: LockMetadataStore,
        clock: T,
    ) -> Self {
        LockController {
            mode,
            keys,
            records,
            clock,
        }
    }

    pub fn slot_mode(&self) -> SlotMode {
        self.mode
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    pub fn metadata_store(&self) -> &LockMetadataStore {
        &self.records
    }

    fn resolve(&self, path: &Path) -> Result<Target> {
        let meta = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let canonical = fs::canonicalize(path)?;
        let file_path = canonical.to_string_lossy().into_owned();
        let slot = Slot::for_path(self.mode, &canonical);

        Ok(Target {
            canonical,
            file_path,
            slot,
        })
    }

    /// Encrypt `path` so it cannot be decrypted for `duration_secs` seconds
    pub fn lock(&self, path: &Path, duration_secs: u64) -> Result<LockReceipt> {
        let target = self.resolve(path)?;

        if duration_secs == 0 {
            return Err(Error::InvalidDuration(
                "duration must be greater than zero seconds".to_string(),
            ));
        }
        if duration_secs > MAX_DURATION_SECS {
            return Err(Error::InvalidDuration(format!(
                "duration of {} seconds exceeds the maximum of {}",
                duration_secs, MAX_DURATION_SECS
            )));
        }

        let orphaned = match self.records.read(&target.slot) {
            Ok(Some(existing)) if existing.file_path == target.file_path => {
                if self.is_sealed(&target)? {
                    return Err(Error::AlreadyLocked {
                        path: existing.file_path,
                        unlock_at: existing.unlock_at,
                    });
                }
                // Left behind by a lock or unlock that stopped part way
                warn!(
                    "Lock state for '{}' does not match the file on disk; replacing it",
                    existing.file_path
                );
                None
            }
            Ok(Some(existing)) => {
                warn!(
                    "Overwriting lock state of '{}'; it can no longer be unlocked",
                    existing.file_path
                );
                Some(existing.file_path)
            }
            Ok(None) => None,
            Err(Error::CorruptMetadata { path, reason }) => {
                if self.is_sealed(&target)? {
                    return Err(Error::CorruptMetadata { path, reason });
                }
                warn!("Replacing unreadable lock record {:?}: {}", path, reason);
                None
            }
            Err(e) => return Err(e),
        };

        let locked_at = self.clock.now()?;
        let unlock_at = locked_at
            .checked_add_signed(Duration::seconds(duration_secs as i64))
            .ok_or_else(|| {
                Error::InvalidDuration(format!("{} seconds overflows the calendar", duration_secs))
            })?;

        let key = self.keys.generate();
        self.keys.save(&target.slot, &key)?;

        let record = LockRecord::new(target.file_path.clone(), locked_at, unlock_at);
        if let Err(e) = self.records.write(&target.slot, &record) {
            self.roll_back(&target.slot);
            return Err(e);
        }

        // A failed encrypt leaves the file untouched, so the fresh state can go
        if let Err(e) = encrypt_file(&target.canonical, &key) {
            self.roll_back(&target.slot);
            return Err(e);
        }

        info!(
            "Locked '{}' until {} (slot {})",
            target.file_path, unlock_at, target.slot
        );

        Ok(LockReceipt {
            file_path: target.file_path,
            locked_at,
            unlock_at,
            orphaned,
        })
    }

    /// Whether the target file opens under the key saved for its slot
    ///
    /// Nothing is written; the plaintext is discarded.
    fn is_sealed(&self, target: &Target) -> Result<bool> {
        let key = match self.keys.load(&target.slot) {
            Ok(key) => key,
            Err(Error::KeyNotFound) => return Ok(false),
            Err(e) => return Err(e),
        };

        let bytes = fs::read(&target.canonical)?;
        match EncryptedData::from_bytes(&bytes).and_then(|sealed| decrypt(&key, &sealed)) {
            Ok(_) => Ok(true),
            Err(Error::AuthenticationFailure) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn roll_back(&self, slot: &Slot) {
        if let Err(e) = self.records.delete(slot) {
            warn!("Failed to remove lock record for slot {}: {}", slot, e);
        }
        if let Err(e) = self.keys.purge(slot) {
            warn!("Failed to remove key for slot {}: {}", slot, e);
        }
    }

    /// Decrypt `path` if its unlock time has passed
    pub fn unlock(&self, path: &Path) -> Result<UnlockReceipt> {
        let target = self.resolve(path)?;

        let record = self
            .records
            .read(&target.slot)?
            .ok_or(Error::NoActiveLock)?;

        if record.file_path != target.file_path {
            return Err(Error::PathMismatch {
                requested: target.file_path,
                locked: record.file_path,
            });
        }

        let now = self.clock.now()?;
        if !record.is_open_at(now) {
            let remaining = record.remaining_at(now);
            debug!(
                "'{}' still locked for {}s",
                record.file_path,
                remaining.num_seconds()
            );
            return Err(Error::StillLocked {
                unlock_at: record.unlock_at,
                remaining,
            });
        }

        let key = self.keys.load(&target.slot)?;

        if let Err(e) = decrypt_file(&target.canonical, &key) {
            if matches!(e, Error::AuthenticationFailure) {
                warn!(
                    "'{}' failed authentication; it may have been tampered with. Lock state kept.",
                    record.file_path
                );
            }
            return Err(e);
        }

        self.keys.purge(&target.slot)?;
        self.records.delete(&target.slot)?;

        info!("Unlocked '{}' at {}", record.file_path, now);

        Ok(UnlockReceipt {
            file_path: record.file_path,
            unlocked_at: now,
        })
    }

    /// Active locks with their remaining time
    ///
    /// The time source is only queried when at least one lock exists.
    pub fn status(&self) -> Result<Vec<LockStatus>> {
        let records = self.records.list()?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now()?;
        Ok(records
            .into_iter()
            .map(|(slot, record)| LockStatus {
                remaining: record.remaining_at(now),
                key_present: self.keys.exists(&slot),
                file_path: record.file_path,
                unlock_at: record.unlock_at,
            })
            .collect())
    }
}
