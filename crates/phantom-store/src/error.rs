//! Error types for ledger storage.

use phantom_core::EntityKey;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Gave up waiting for a row lock.
    #[error("lock wait timeout on {key}")]
    LockTimeout {
        /// The row being waited on.
        key: EntityKey,
    },

    /// Waiting for the row would close a cycle of waiting units.
    #[error("deadlock detected waiting for {key}")]
    Deadlock {
        /// The row being waited on.
        key: EntityKey,
    },

    /// The backend refused the operation because of concurrent activity.
    #[error("resource busy: {0}")]
    Busy(String),

    /// A write touched a row this unit of work has not locked.
    #[error("write to {key} without holding its lock")]
    NotLocked {
        /// The row written.
        key: EntityKey,
    },

    /// A write would break a stored invariant.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Record not found.
    #[error("not found: {key}")]
    NotFound {
        /// The missing row.
        key: EntityKey,
    },
}

impl StoreError {
    /// Whether the failure came from lock contention rather than a fault.
    ///
    /// A unit of work that failed this way changed nothing, and running the
    /// whole unit again may succeed.
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::Deadlock { .. } | Self::Busy(_)
        )
    }
}
