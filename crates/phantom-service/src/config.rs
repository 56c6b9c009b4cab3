//! Service configuration.

use std::time::Duration;

use phantom_engine::EngineConfig;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/phantom-mask").
    /// Ignored by the in-memory backend.
    pub data_dir: String,

    /// How long a unit of work waits for one row lock.
    pub lock_timeout: Duration,

    /// Budget for a whole engine call. Never longer than the HTTP request
    /// timeout; `None` leaves that timeout as the only limit.
    pub request_deadline: Option<Duration>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/phantom-mask".into(),
            lock_timeout: engine.lock_timeout,
            request_deadline: engine.request_deadline,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// `REQUEST_DEADLINE_MS=0` leaves the engine bounded by the request
    /// timeout alone.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            lock_timeout: env_parse::<u64>("LOCK_TIMEOUT_MS")
                .map_or(defaults.lock_timeout, Duration::from_millis),
            request_deadline: match env_parse::<u64>("REQUEST_DEADLINE_MS") {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => defaults.request_deadline,
            },
            cors_origins: std::env::var("CORS_ORIGINS").map_or(defaults.cors_origins, |s| {
                s.split(',').map(|o| o.trim().to_string()).collect()
            }),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }

    /// The engine settings carried by this configuration.
    ///
    /// The engine deadline is capped at the request timeout, so a unit of
    /// work never outlives the HTTP response that started it.
    #[must_use]
    pub fn engine(&self) -> EngineConfig {
        let http = Duration::from_secs(self.request_timeout_seconds);
        EngineConfig {
            lock_timeout: self.lock_timeout,
            request_deadline: Some(self.request_deadline.map_or(http, |d| d.min(http))),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}
