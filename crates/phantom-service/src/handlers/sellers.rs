//! Seller and catalog handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use phantom_core::{Product, ProductDraft, Seller, SellerId};
use phantom_engine::CatalogBatch;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Get a seller and its current balance.
pub async fn get_seller(
    State(state): State<Arc<AppState>>,
    Path(seller_id): Path<SellerId>,
) -> Result<Json<Seller>, ApiError> {
    let seller = state.run(move |engine| engine.seller(seller_id)).await?;
    Ok(Json(seller))
}

/// List a seller's products.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Path(seller_id): Path<SellerId>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state.run(move |engine| engine.products(seller_id)).await?;
    Ok(Json(products))
}

/// Batch catalog request.
#[derive(Debug, Deserialize)]
pub struct BatchProductsRequest {
    /// Products to create (no `product_id`) or update.
    pub products: Vec<ProductDraft>,
}

/// Create and update several products of one seller atomically.
pub async fn upsert_products(
    State(state): State<Arc<AppState>>,
    Path(seller_id): Path<SellerId>,
    Json(request): Json<BatchProductsRequest>,
) -> Result<Json<CatalogBatch>, ApiError> {
    let batch = state
        .run(move |engine| engine.upsert_products(seller_id, &request.products))
        .await?;

    tracing::debug!(
        seller_id = %seller_id,
        created = batch.created.len(),
        updated = batch.updated.len(),
        "Catalog batch applied"
    );
    Ok(Json(batch))
}
