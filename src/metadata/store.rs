//! File-based lock metadata store
//!
//! Records are pretty-printed JSON so they can be inspected by hand. In
//! single-slot mode there is one record file; per-file mode keeps one
//! record per slot under `locks/`.

use crate::error::{Error, Result};
use crate::fsutil::{remove_if_exists, write_atomic};
use crate::metadata::LockRecord;
use crate::slot::Slot;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the record in single-slot mode
pub const METADATA_FILE_NAME: &str = "lock_metadata.json";

/// Directory holding per-file records
pub const LOCKS_DIR_NAME: &str = "locks";

/// Persists lock records under a state directory
pub struct LockMetadataStore {
    state_dir: PathBuf,
}

impl LockMetadataStore {
    /// Create a store rooted at `state_dir`
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        LockMetadataStore {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    /// Location of the record file for a slot
    pub fn record_path(&self, slot: &Slot) -> PathBuf {
        match slot {
            Slot::Global => self.state_dir.join(METADATA_FILE_NAME),
            Slot::File(id) => self
                .state_dir
                .join(LOCKS_DIR_NAME)
                .join(format!("{}.json", id)),
        }
    }

    /// Write a record, replacing whatever the slot held
    pub fn write(&self, slot: &Slot, record: &LockRecord) -> Result<()> {
        let path = self.record_path(slot);
        let content = serde_json::to_string_pretty(record)?;
        write_atomic(&path, content.as_bytes(), false)?;
        debug!("Wrote lock record for slot {} to {:?}", slot, path);
        Ok(())
    }

    /// Read the record for a slot, `None` if there is none
    pub fn read(&self, slot: &Slot) -> Result<Option<LockRecord>> {
        Self::read_path(&self.record_path(slot))
    }

    fn read_path(path: &Path) -> Result<Option<LockRecord>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(Error::CorruptMetadata {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let record = serde_json::from_str(&content).map_err(|e| Error::CorruptMetadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }

    /// Remove the record for a slot; succeeds if it is already gone
    pub fn delete(&self, slot: &Slot) -> Result<()> {
        if remove_if_exists(&self.record_path(slot))? {
            debug!("Deleted lock record for slot {}", slot);
        }
        Ok(())
    }

    /// All stored records with their slots, single-slot record first
    pub fn list(&self) -> Result<Vec<(Slot, LockRecord)>> {
        let mut records = Vec::new();

        if let Some(record) = self.read(&Slot::Global)? {
            records.push((Slot::Global, record));
        }

        let locks_dir = self.state_dir.join(LOCKS_DIR_NAME);
        let entries = match fs::read_dir(&locks_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(id) => id.to_string(),
                None => continue,
            };
            if let Some(record) = Self::read_path(&path)? {
                records.push((Slot::File(id), record));
            }
        }

        debug!("Found {} active lock record(s)", records.len());
        Ok(records)
    }
}
