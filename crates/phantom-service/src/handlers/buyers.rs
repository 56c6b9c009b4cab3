//! Buyer handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use phantom_core::{Buyer, BuyerId};

use crate::error::ApiError;
use crate::state::AppState;

/// Get a buyer and its current balance.
pub async fn get_buyer(
    State(state): State<Arc<AppState>>,
    Path(buyer_id): Path<BuyerId>,
) -> Result<Json<Buyer>, ApiError> {
    let buyer = state.run(move |engine| engine.buyer(buyer_id)).await?;
    Ok(Json(buyer))
}
