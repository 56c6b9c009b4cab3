//! Conflict classification of store failures.
//!
//! Lock-wait timeouts, deadlocks, and busy backends become
//! [`EngineError::TransientConflict`]; everything else the store reports is
//! internal. Business errors never pass through here.

use phantom_store::{StoreError, UnitOfWork};

use crate::error::{EngineError, Result};

/// Map a store failure to the caller-facing error.
pub(crate) fn classify(err: StoreError) -> EngineError {
    if err.is_contention() {
        tracing::warn!(error = %err, "Store conflict, unit of work rolled back");
        EngineError::TransientConflict {
            reason: err.to_string(),
        }
    } else {
        tracing::error!(error = %err, "Store failure");
        EngineError::Store(err)
    }
}

/// Commit a unit of work, classifying any failure.
pub(crate) fn commit<U: UnitOfWork>(unit: U) -> Result<()> {
    unit.commit().map_err(classify)
}

/// Roll back after a failure. The original error wins over a rollback error.
pub(crate) fn abandon<U: UnitOfWork>(unit: U, cause: &EngineError) {
    if let Err(err) = unit.rollback() {
        tracing::error!(error = %err, %cause, "Rollback failed");
    }
}
