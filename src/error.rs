//! Error types for delivery transactions.
//!
//! Every failure a backend can report maps to one variant here, so callers can
//! tell recoverable conditions (a single rejected recipient) apart from ones
//! that require aborting the whole transaction.

use thiserror::Error;

/// Top-level error type for transaction operations.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// The backend could not begin a transaction. No cleanup is owed.
    #[error("Transaction start failed: {0}")]
    Start(String),

    /// One recipient was rejected. The transaction remains usable for other
    /// recipients, and abort still succeeds afterwards.
    #[error("Recipient rejected: {0}")]
    RecipientRejected(String),

    /// Atomic body submission failed. The transaction is failed for all
    /// recipients and the caller should abort.
    #[error("Body submission failed: {0}")]
    Body(String),

    /// Finalization failed after a successful body transfer. The caller must
    /// not assume delivery occurred.
    #[error("Commit failed: {0}")]
    Commit(String),

    /// An operation was invoked in a state where it is not legal, e.g. a
    /// commit before any body was submitted.
    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    /// Internal backend error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeliveryError {
    /// Returns `true` if this error leaves the transaction usable (the caller
    /// may keep adding recipients or abort at their leisure).
    #[must_use]
    pub const fn is_recipient_rejected(&self) -> bool {
        matches!(self, Self::RecipientRejected(_))
    }

    /// Returns `true` if this error requires the caller to abort the whole
    /// transaction.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Body(_) | Self::Commit(_) | Self::Internal(_))
    }

    /// Returns `true` if the operation was rejected for being out of sequence.
    #[must_use]
    pub const fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}

/// Specialized `Result` type for transaction operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_rejection_is_not_fatal() {
        let err = DeliveryError::RecipientRejected("unknown mailbox".to_string());
        assert!(err.is_recipient_rejected());
        assert!(!err.is_fatal());
    }

    #[test]
    fn body_and_commit_failures_are_fatal() {
        assert!(DeliveryError::Body("disk full".to_string()).is_fatal());
        assert!(DeliveryError::Commit("downstream rejected".to_string()).is_fatal());
        assert!(!DeliveryError::Start("overloaded".to_string()).is_fatal());
    }

    #[test]
    fn error_display() {
        let err = DeliveryError::RecipientRejected("bad@domain".to_string());
        assert_eq!(err.to_string(), "Recipient rejected: bad@domain");

        let err = DeliveryError::InvalidState("body already submitted".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid transaction state: body already submitted"
        );
    }
}
