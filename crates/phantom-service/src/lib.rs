//! Phantom Mask Service - HTTP API for the mask marketplace ledger.
//!
//! A thin axum layer over [`phantom_engine::Engine`]. Engine error kinds map to
//! statuses: not found → 404, business rule → 400, transient conflict → 409,
//! internal → 500.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::{open_backend, AppState, Backend};
