//! Error types for timelock

use chrono::{DateTime, Duration, FixedOffset};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for timelock
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid command '{0}'. Please enter 'lock' or 'unlock'.")]
    InvalidCommand(String),

    // Lock state errors
    #[error("No active lock found")]
    NoActiveLock,

    #[error("Path mismatch: '{requested}' is not the locked file (currently locked: '{locked}')")]
    PathMismatch { requested: String, locked: String },

    #[error("File is still locked until {unlock_at} ({} remaining)", format_remaining(.remaining))]
    StillLocked {
        unlock_at: DateTime<FixedOffset>,
        remaining: Duration,
    },

    #[error("File is already locked until {unlock_at}: {path}")]
    AlreadyLocked {
        path: String,
        unlock_at: DateTime<FixedOffset>,
    },

    // Key errors
    #[error("No key found to unlock the file")]
    KeyNotFound,

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    // Crypto errors
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Authentication failed: data corrupted, tampered with, or wrong key")]
    AuthenticationFailure,

    // Metadata errors
    #[error("Corrupt lock metadata at {}: {reason}", .path.display())]
    CorruptMetadata { path: PathBuf, reason: String },

    // Time source errors
    #[error("Trusted time source unavailable: {0}")]
    TimeSourceUnavailable(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Process exit code for the CLI
    ///
    /// 1 = validation or lock state, 2 = I/O or time source,
    /// 3 = authentication or corruption.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::FileNotFound(_)
            | Error::InvalidDuration(_)
            | Error::InvalidCommand(_)
            | Error::NoActiveLock
            | Error::PathMismatch { .. }
            | Error::StillLocked { .. }
            | Error::AlreadyLocked { .. }
            | Error::KeyNotFound
            | Error::Config(_)
            | Error::InvalidConfig(_) => 1,
            Error::Io(_)
            | Error::TimeSourceUnavailable(_)
            | Error::Serialization(_)
            | Error::Encryption(_) => 2,
            Error::AuthenticationFailure
            | Error::CorruptMetadata { .. }
            | Error::InvalidKeyLength { .. } => 3,
        }
    }

    /// Whether this is an ordinary user-facing outcome rather than a fault
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound(_)
                | Error::InvalidDuration(_)
                | Error::InvalidCommand(_)
                | Error::NoActiveLock
                | Error::PathMismatch { .. }
                | Error::StillLocked { .. }
                | Error::AlreadyLocked { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Render a remaining duration as `1d 2h 3m 4s`, omitting leading zero units
pub fn format_remaining(remaining: &Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 || !parts.is_empty() {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 || !parts.is_empty() {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", seconds));
    parts.join(" ")
}
