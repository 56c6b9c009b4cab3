//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{buyers, health, products, sellers, transactions};
use crate::state::AppState;

/// Maximum concurrent requests for purchase endpoints.
/// Each one may hold row locks on a blocking thread.
const PURCHASE_MAX_CONCURRENT_REQUESTS: usize = 64;

/// Maximum concurrent requests for the rest of the API.
const API_MAX_CONCURRENT_REQUESTS: usize = 128;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Transactions
/// - `POST /v1/transactions` - Single purchase
/// - `POST /v1/transactions/multi-seller` - Atomic multi-seller purchase
/// - `POST /v1/transactions/validate` - Check a purchase without applying it
/// - `GET /v1/transactions` - Purchase history, newest first
/// - `GET /v1/transactions/{id}` - One purchase record
///
/// ## Catalog
/// - `GET /v1/products/{id}` - Product
/// - `PATCH /v1/products/{id}/stock` - Adjust stock
/// - `GET /v1/sellers/{id}` - Seller
/// - `GET /v1/sellers/{id}/products` - Seller's products
/// - `POST /v1/sellers/{id}/products/batch` - Batch create/update
///
/// ## Buyers
/// - `GET /v1/buyers/{id}` - Buyer
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let purchase_routes = Router::new()
        .route(
            "/",
            post(transactions::create_transaction).get(transactions::list_transactions),
        )
        .route(
            "/multi-seller",
            post(transactions::create_multi_seller_transaction),
        )
        .route("/validate", post(transactions::validate_transaction))
        .route("/:id", get(transactions::get_transaction))
        .layer(ConcurrencyLimitLayer::new(PURCHASE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .nest("/transactions", purchase_routes)
        // Catalog
        .route("/products/:id", get(products::get_product))
        .route("/products/:id/stock", patch(products::update_stock))
        .route("/sellers/:id", get(sellers::get_seller))
        .route("/sellers/:id/products", get(sellers::list_products))
        .route("/sellers/:id/products/batch", post(sellers::upsert_products))
        // Buyers
        .route("/buyers/:id", get(buyers::get_buyer))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}
