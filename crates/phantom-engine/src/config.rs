//! Engine configuration.

use std::time::Duration;

use phantom_core::Deadline;

/// Settings passed to [`Engine::new`](crate::Engine::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Longest a unit of work waits for any single row lock.
    pub lock_timeout: Duration,

    /// Deadline applied by the operations that do not take one explicitly.
    /// `None` means no deadline.
    pub request_deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(2),
            request_deadline: Some(Duration::from_secs(10)),
        }
    }
}

impl EngineConfig {
    /// A fresh deadline for one request.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        Deadline::from_timeout(self.request_deadline)
    }
}
