//! API handlers.
//!
//! Every handler that touches the engine goes through [`AppState::run`], which
//! moves the call onto the blocking pool.
//!
//! [`AppState::run`]: crate::state::AppState::run

pub mod buyers;
pub mod health;
pub mod products;
pub mod sellers;
pub mod transactions;
