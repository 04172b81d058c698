//! Error types for Vellum core.

use crate::types::{ContentSetId, Language, ObjectId, Timestamp, UserId};
use crate::version_number::VersionNumber;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Vellum core operations.
///
/// Concurrency outcomes (`LockConflict`, `StaleWrite`) are always returned to
/// the caller; the core never retries them on its own.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Object is locked by another user whose lock has not timed out.
    #[error("{object} is locked by {owner} for another {remaining:?}")]
    LockConflict {
        /// The contended object.
        object: ObjectId,
        /// The current lock owner.
        owner: UserId,
        /// Time left until the lock may be taken over.
        remaining: Duration,
    },

    /// Caller tried to release, save or cancel a lock it does not hold.
    #[error("{caller} does not hold the lock on {object} (owner: {owner:?})")]
    NotLockOwner {
        /// The object in question.
        object: ObjectId,
        /// The user that attempted the operation.
        caller: UserId,
        /// The actual owner, if the object is locked at all.
        owner: Option<UserId>,
    },

    /// The ledger head moved since the caller read it.
    #[error("stale write on {object}: expected head {expected:?}, found {actual:?}")]
    StaleWrite {
        /// The object whose ledger rejected the append.
        object: ObjectId,
        /// The head the caller based its write on.
        expected: Option<VersionNumber>,
        /// The head actually found in the ledger.
        actual: Option<VersionNumber>,
    },

    /// No version exists at or before the requested timestamp.
    #[error("no version of {object} at or before {timestamp}")]
    VersionNotFound {
        /// The object searched.
        object: ObjectId,
        /// The requested point in time.
        timestamp: Timestamp,
    },

    /// Object not found.
    #[error("object not found: {object}")]
    ObjectNotFound {
        /// The missing object.
        object: ObjectId,
    },

    /// Object is in the wastebin and cannot be edited.
    #[error("object {object} was deleted at {deleted_at}")]
    ObjectDeleted {
        /// The tombstoned object.
        object: ObjectId,
        /// When it was deleted.
        deleted_at: Timestamp,
    },

    /// Object has never been published (or was taken offline).
    #[error("object {object} is not published")]
    NotPublished {
        /// The object.
        object: ObjectId,
    },

    /// A named field-group exists neither in the live object nor in the target version.
    #[error("field group {name:?} not found on {object}")]
    FieldGroupNotFound {
        /// The object searched.
        object: ObjectId,
        /// The requested field-group name.
        name: String,
    },

    /// Another object already occupies this language slot of the content set.
    #[error("{content_set} already has a variant for language {language}")]
    DuplicateVariant {
        /// The content set.
        content_set: ContentSetId,
        /// The contended language.
        language: Language,
    },

    /// Waiting for a per-key critical section took longer than allowed.
    #[error("timed out after {waited:?} waiting for region {key}")]
    RegionTimeout {
        /// Debug rendering of the contended key.
        key: String,
        /// How long the caller waited.
        waited: Duration,
    },

    /// A dotted version number could not be parsed.
    #[error("invalid version number: {input:?}")]
    InvalidVersionNumber {
        /// The rejected input.
        input: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an object-not-found error.
    pub fn object_not_found(object: ObjectId) -> Self {
        Self::ObjectNotFound { object }
    }

    /// Creates a region timeout error.
    pub fn region_timeout(key: impl Into<String>, waited: Duration) -> Self {
        Self::RegionTimeout {
            key: key.into(),
            waited,
        }
    }

    /// Returns true if reloading and repeating the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleWrite { .. } | Self::RegionTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_write_is_retryable() {
        let err = CoreError::StaleWrite {
            object: ObjectId::new(7),
            expected: Some(VersionNumber::new(1, 0)),
            actual: Some(VersionNumber::new(1, 1)),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("obj:7"));
    }

    #[test]
    fn lock_conflict_is_not_retryable() {
        let err = CoreError::LockConflict {
            object: ObjectId::new(1),
            owner: UserId::new(2),
            remaining: Duration::from_secs(5),
        };
        assert!(!err.is_retryable());
    }
}
