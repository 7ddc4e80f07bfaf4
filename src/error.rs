//! Error taxonomy for timer operations

use thiserror::Error;

/// Errors surfaced synchronously by lifecycle operations and the storage
/// layer. None of these are retried internally; the caller decides whether
/// to retry, force, or propagate.
#[derive(Debug, Error)]
pub enum TimerError {
    /// The operation requires an existing record and none was found
    #[error("timer has not been started")]
    NotStarted,

    /// `start` was called without `force_start` while a record exists
    #[error("timer is already started")]
    AlreadyStarted,

    /// `pause` was called while the last pause period is still open
    #[error("timer is already paused")]
    AlreadyPaused,

    /// `resume` was called with no open pause period
    #[error("timer is not paused")]
    NotPaused,

    /// A duration adjustment was applied to the wrong timer kind
    #[error("operation does not apply to this timer kind")]
    InvalidTimerType,

    /// The storage backend failed to read, write, or delete
    #[error("storage backend error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted record could not be encoded or decoded
    #[error("record serialization error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, TimerError>;
