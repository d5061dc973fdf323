//! Error types for submissions.
//!
//! Every variant is a value the caller decides what to do with; none of them
//! mean the coordinator is broken.

use thiserror::Error;

/// Why a [`submit`] did not save the record.
///
/// [`submit`]: crate::UpdateCoordinator::submit
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Another write is outstanding, or writes are suppressed. Nothing was sent.
    #[error("submission rejected: another write is in progress or writes are suppressed")]
    LockRejected,

    /// The record carries no identifying key. Nothing was sent.
    #[error("validation failed: record has no identifying key")]
    ValidationFailed,

    /// The store returned an error (or the write panicked).
    #[error("transport error: {0}")]
    TransportFailed(String),

    /// The safety timer released the lock before the write settled. The
    /// write was abandoned, so it may or may not have landed.
    #[error("write did not settle before the safety timeout, lock released")]
    TimeoutReleased,
}

impl SubmitError {
    /// Returns true if the user should not be told about this outcome.
    /// Only validation and transport failures produce a notification.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            SubmitError::LockRejected | SubmitError::TimeoutReleased
        )
    }

    /// Returns true if submitting again later may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SubmitError::ValidationFailed)
    }
}
