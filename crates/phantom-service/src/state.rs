//! Application state.

use std::sync::Arc;

use phantom_engine::Engine;

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// The store backing the service.
#[cfg(not(feature = "rocksdb-backend"))]
pub type Backend = phantom_store::MemoryStore;

/// Name of [`Backend`] as reported by the health check.
#[cfg(not(feature = "rocksdb-backend"))]
pub const BACKEND_NAME: &str = "memory";

/// Name of [`Backend`] as reported by the health check.
#[cfg(feature = "rocksdb-backend")]
pub const BACKEND_NAME: &str = "rocksdb";

/// The store backing the service.
#[cfg(feature = "rocksdb-backend")]
pub type Backend = phantom_store::RocksStore;

/// Open the configured backend.
///
/// # Errors
///
/// Returns an error if the `RocksDB` directory cannot be opened.
#[cfg(not(feature = "rocksdb-backend"))]
pub fn open_backend(_config: &ServiceConfig) -> phantom_store::Result<Backend> {
    tracing::warn!("Using the in-memory store; data is lost on restart");
    Ok(Backend::new())
}

/// Open the configured backend.
///
/// # Errors
///
/// Returns an error if the `RocksDB` directory cannot be opened.
#[cfg(feature = "rocksdb-backend")]
pub fn open_backend(config: &ServiceConfig) -> phantom_store::Result<Backend> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Backend::open(&config.data_dir)
}

/// Application state shared across handlers.
pub struct AppState {
    /// The purchase engine.
    pub engine: Engine<Backend>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Wrap a store in an engine configured from `config`.
    #[must_use]
    pub fn new(store: Backend, config: ServiceConfig) -> Self {
        Self {
            engine: Engine::new(store, config.engine()),
            config,
        }
    }

    /// Run an engine call on the blocking pool.
    ///
    /// Lock waits block the calling thread, so engine calls never run on the
    /// async workers.
    pub async fn run<T, F>(self: &Arc<Self>, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Engine<Backend>) -> phantom_engine::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || op(&state.engine))
            .await
            .map_err(|e| ApiError::Internal(format!("engine task failed: {e}")))?
            .map_err(ApiError::from)
    }
}
