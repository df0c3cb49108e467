//! timelock - Time-locked file encryption
//!
//! Encrypts a file in place and refuses to decrypt it until a trusted,
//! remote time source reports that the chosen duration has elapsed.

pub mod config;
pub mod crypto;
pub mod error;
mod fsutil;
pub mod lock;
pub mod metadata;
pub mod slot;
pub mod time;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, SlotMode};
    pub use crate::error::{Error, Result};
    pub use crate::lock::{LockController, LockReceipt, LockStatus, UnlockReceipt};
    pub use crate::time::{HttpTimeOracle, ManualClock, TimeSource};
}
