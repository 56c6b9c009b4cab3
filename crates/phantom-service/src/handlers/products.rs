//! Product handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use phantom_core::{Product, ProductId};
use phantom_engine::StockAdjustment;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Get a product.
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    let product = state.run(move |engine| engine.product(product_id)).await?;
    Ok(Json(product))
}

/// Stock change request.
#[derive(Debug, Deserialize)]
pub struct StockUpdateRequest {
    /// Units to add (positive) or remove (negative).
    pub quantity_change: i64,
    /// Free-form note kept in the response and the log.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Add or remove stock.
pub async fn update_stock(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<ProductId>,
    Json(request): Json<StockUpdateRequest>,
) -> Result<Json<StockAdjustment>, ApiError> {
    let adjustment = state
        .run(move |engine| {
            engine.adjust_stock(product_id, request.quantity_change, request.reason)
        })
        .await?;
    Ok(Json(adjustment))
}
