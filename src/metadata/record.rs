//! Lock record

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

/// Binding between a locked file and its unlock time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Canonical absolute path of the locked file
    pub file_path: String,
    /// Trusted time at which the lock was taken
    pub locked_at: DateTime<FixedOffset>,
    /// Trusted time after which the file may be decrypted
    pub unlock_at: DateTime<FixedOffset>,
}

impl LockRecord {
    pub fn new(
        file_path: impl Into<String>,
        locked_at: DateTime<FixedOffset>,
        unlock_at: DateTime<FixedOffset>,
    ) -> Self {
        LockRecord {
            file_path: file_path.into(),
            locked_at,
            unlock_at,
        }
    }

    /// Whether the lock has expired at `now`
    pub fn is_open_at(&self, now: DateTime<FixedOffset>) -> bool {
        now >= self.unlock_at
    }

    /// Time left until `unlock_at`, zero once expired
    pub fn remaining_at(&self, now: DateTime<FixedOffset>) -> Duration {
        let remaining = self.unlock_at.signed_duration_since(now);
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }
}
