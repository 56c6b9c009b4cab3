//! The purchase state machine.
//!
//! ```text
//! Validating -> Locking -> Rechecking -> Committing -> Committed
//!      \            \            \             \
//!       `------------`------------`-------------`--> RolledBack
//! ```
//!
//! The deadline is checked on entry to `Locking` and `Committing`, the two
//! phases that can block.

use std::fmt;
use std::time::Duration;

use phantom_core::Deadline;
use serde::Serialize;

use crate::error::{EngineError, Result};

/// Phase of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchasePhase {
    /// Lock-free existence and precondition reads.
    Validating,
    /// Taking row locks in global order.
    Locking,
    /// Re-running the checks on locked rows.
    Rechecking,
    /// Writing and committing.
    Committing,
    /// Terminal: every write applied.
    Committed,
    /// Terminal: nothing applied.
    RolledBack,
}

impl PurchasePhase {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Locking => "locking",
            Self::Rechecking => "rechecking",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    const fn can_enter(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Validating, Self::Locking)
                | (Self::Locking, Self::Rechecking)
                | (Self::Rechecking, Self::Committing)
                | (Self::Committing, Self::Committed)
        ) || (!self.is_terminal() && matches!(next, Self::RolledBack))
    }
}

impl fmt::Display for PurchasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one operation through the state machine.
#[derive(Debug)]
pub(crate) struct Flow {
    operation: &'static str,
    phase: PurchasePhase,
    deadline: Deadline,
}

impl Flow {
    pub(crate) fn start(operation: &'static str, deadline: Deadline) -> Self {
        tracing::debug!(operation, phase = %PurchasePhase::Validating, "Unit of work started");
        Self {
            operation,
            phase: PurchasePhase::Validating,
            deadline,
        }
    }

    #[cfg(test)]
    pub(crate) const fn phase(&self) -> PurchasePhase {
        self.phase
    }

    /// Lock wait for this unit: the configured wait, cut short by the deadline.
    pub(crate) fn lock_wait(&self, lock_timeout: Duration) -> Duration {
        self.deadline.clamp(lock_timeout)
    }

    /// Fail if the deadline has passed, reporting the current phase.
    pub(crate) fn check_deadline(&self) -> Result<()> {
        if self.deadline.is_expired() {
            tracing::warn!(operation = self.operation, phase = %self.phase, "Deadline exceeded");
            return Err(EngineError::DeadlineExceeded { phase: self.phase });
        }
        Ok(())
    }

    /// Move to `next`, failing if the deadline has passed before a blocking phase.
    pub(crate) fn enter(&mut self, next: PurchasePhase) -> Result<()> {
        if !self.phase.can_enter(next) {
            return Err(EngineError::Internal(format!(
                "{}: illegal transition {} -> {next}",
                self.operation, self.phase
            )));
        }
        if matches!(next, PurchasePhase::Locking | PurchasePhase::Committing)
            && self.deadline.is_expired()
        {
            tracing::warn!(operation = self.operation, phase = %next, "Deadline exceeded");
            return Err(EngineError::DeadlineExceeded { phase: next });
        }
        tracing::debug!(
            operation = self.operation,
            from = %self.phase,
            to = %next,
            "Phase transition"
        );
        self.phase = next;
        Ok(())
    }

    /// Record the terminal state for `result` and pass it through.
    pub(crate) fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => {
                self.phase = PurchasePhase::Committed;
            }
            Err(err) => {
                tracing::debug!(
                    operation = self.operation,
                    from = %self.phase,
                    kind = ?err.kind(),
                    error = %err,
                    "Rolled back"
                );
                self.phase = PurchasePhase::RolledBack;
            }
        }
        result
    }
}
