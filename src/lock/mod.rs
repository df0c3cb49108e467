//! Time-gated lock protocol
//!
//! Ties the time oracle, key store, cipher and metadata store together.
//! Results are returned as receipts; rendering them is up to the caller.

mod controller;

pub use controller::LockController;

use crate::error::format_remaining;
use chrono::{DateTime, Duration, FixedOffset};
use std::fmt;

/// Outcome of a successful lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockReceipt {
    pub file_path: String,
    pub locked_at: DateTime<FixedOffset>,
    pub unlock_at: DateTime<FixedOffset>,
    /// Path of a different file whose lock state was overwritten (single-slot mode)
    pub orphaned: Option<String>,
}

impl fmt::Display for LockReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "File '{}' is now locked until {}",
            self.file_path,
            self.unlock_at.format("%Y-%m-%d %H:%M:%S %:z")
        )
    }
}

/// Outcome of a successful unlock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockReceipt {
    pub file_path: String,
    pub unlocked_at: DateTime<FixedOffset>,
}

impl fmt::Display for UnlockReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File '{}' has been unlocked", self.file_path)
    }
}

/// One active lock as seen by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStatus {
    pub file_path: String,
    pub unlock_at: DateTime<FixedOffset>,
    /// Zero once the lock has expired
    pub remaining: Duration,
    /// Whether the key file is present
    pub key_present: bool,
}

impl LockStatus {
    pub fn is_unlockable(&self) -> bool {
        self.remaining <= Duration::zero() && self.key_present
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if !self.key_present {
            "KEY MISSING".to_string()
        } else if self.remaining <= Duration::zero() {
            "ready to unlock".to_string()
        } else {
            format!("{} remaining", format_remaining(&self.remaining))
        };
        write!(
            f,
            "{}  until {}  ({})",
            self.file_path,
            self.unlock_at.format("%Y-%m-%d %H:%M:%S %:z"),
            state
        )
    }
}
