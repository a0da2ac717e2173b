//! Error types for vfeed-player
//!
//! The coordinator and resolver never hand these to their callers; they are
//! produced by unit capabilities and native handle calls, then classified and
//! logged at the coordination boundary.

use thiserror::Error;
use vfeed_common::UnitId;

/// Fragments of native error text that mean the underlying view or player was
/// recycled out from under an in-flight call.
const INVALID_HANDLE_PATTERNS: &[&str] = &[
    "invalid view",
    "does not exist",
    "not loaded",
    "has been released",
    "player is null",
];

/// Main error type for vfeed-player
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A unit's activate/deactivate capability rejected
    #[error("Capability rejected for {unit_id}: {reason}")]
    CapabilityRejected { unit_id: UnitId, reason: String },

    /// A native call exceeded its bound and was abandoned
    #[error("Native call '{call}' timed out after {after_ms}ms")]
    NativeCallTimeout { call: &'static str, after_ms: u64 },

    /// Operation against an id with no live registration
    #[error("Unit not registered: {0}")]
    UnregisteredTarget(UnitId),

    /// The platform recycled the handle underneath the call
    #[error("Invalid player handle: {0}")]
    InvalidHandle(String),

    /// Any other native player failure
    #[error("Native player error: {0}")]
    Native(String),

    /// Reloading an unloaded source failed; the unit stays unloaded
    #[error("Reload failed for {unit_id}: {reason}")]
    ReloadFailed { unit_id: UnitId, reason: String },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the common crate (config loading)
    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Clonable wrapper so `Error` stays `Clone` while carrying common errors
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct CommonError(String);

impl From<vfeed_common::Error> for Error {
    fn from(err: vfeed_common::Error) -> Self {
        Error::Common(CommonError(err.to_string()))
    }
}

impl Error {
    /// Classify a raw native error message
    ///
    /// Messages matching a recycled-handle pattern become `InvalidHandle`,
    /// everything else `Native`.
    pub fn from_native(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_invalid_handle_message(&message) {
            Error::InvalidHandle(message)
        } else {
            Error::Native(message)
        }
    }

    /// True for errors that are routine during recycling and only worth a debug line
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::InvalidHandle(_) | Error::UnregisteredTarget(_))
    }
}

/// Case-insensitive match against the known recycled-handle messages
pub fn is_invalid_handle_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    INVALID_HANDLE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Convenience Result type using vfeed-player Error
pub type Result<T> = std::result::Result<T, Error>;
