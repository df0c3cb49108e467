//! Lock metadata module
//!
//! Stores the binding between a locked file and the time it may be
//! unlocked, as human-readable JSON next to the key.

mod record;
mod store;

pub use record::LockRecord;
pub use store::{LockMetadataStore, LOCKS_DIR_NAME, METADATA_FILE_NAME};
