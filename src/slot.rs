//! Lock slot identity
//!
//! A slot names where one key and one lock record live on disk. The
//! default single-slot layout uses one global slot. Per-file mode hashes
//! the canonical path so several files can be locked side by side.

use crate::config::SlotMode;
use std::fmt;
use std::path::Path;

/// Storage identity for one key and one lock record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The single global slot
    Global,
    /// Per-file slot, BLAKE3 hex digest of the canonical path
    File(String),
}

impl Slot {
    /// Resolve the slot for a canonical file path under the given mode
    pub fn for_path(mode: SlotMode, canonical: &Path) -> Self {
        match mode {
            SlotMode::Single => Slot::Global,
            SlotMode::PerFile => {
                let digest = blake3::hash(canonical.to_string_lossy().as_bytes());
                Slot::File(digest.to_hex().to_string())
            }
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Global => write!(f, "global"),
            Slot::File(id) => write!(f, "{}", &id[..id.len().min(16)]),
        }
    }
}
