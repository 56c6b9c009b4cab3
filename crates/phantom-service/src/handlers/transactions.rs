//! Purchase handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use phantom_core::{
    BuyerId, Decimal, MultiPurchaseRequest, ProductId, PurchaseFilter, PurchaseId,
    PurchaseRecord, PurchaseRequest, SellerId,
};
use phantom_engine::ValidatedItem;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Largest page the history endpoint returns.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Buy one product from one seller.
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseRecord>), ApiError> {
    let record = state
        .run(move |engine| engine.purchase_single(request))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Multi-seller purchase response.
#[derive(Debug, Serialize)]
pub struct MultiSellerResponse {
    /// Buyer charged.
    pub buyer_id: BuyerId,
    /// Amount charged.
    pub total_amount: Decimal,
    /// Number of lines committed.
    pub total_items: usize,
    /// One record per line, in request order.
    pub transactions: Vec<PurchaseRecord>,
}

/// Buy from several sellers at once; every line commits or none does.
pub async fn create_multi_seller_transaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MultiPurchaseRequest>,
) -> Result<(StatusCode, Json<MultiSellerResponse>), ApiError> {
    let receipt = state
        .run(move |engine| engine.purchase_multi(&request))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MultiSellerResponse {
            buyer_id: receipt.buyer_id,
            total_amount: receipt.total_amount,
            total_items: receipt.records.len(),
            transactions: receipt.records,
        }),
    ))
}

/// Check a purchase without applying it.
pub async fn validate_transaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<ValidatedItem>, ApiError> {
    let item = state.run(move |engine| engine.validate(request)).await?;
    Ok(Json(item))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Only this buyer's purchases.
    pub buyer_id: Option<BuyerId>,
    /// Only purchases paid to this seller.
    pub seller_id: Option<SellerId>,
    /// Only purchases of this product.
    pub product_id: Option<ProductId>,
    /// Maximum number of records to return (default: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

impl ListTransactionsQuery {
    fn into_filter(self) -> Result<PurchaseFilter, ApiError> {
        if self.limit == 0 || self.limit > MAX_LIST_LIMIT {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_LIST_LIMIT}"
            )));
        }
        Ok(PurchaseFilter {
            buyer_id: self.buyer_id,
            seller_id: self.seller_id,
            product_id: self.product_id,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// List purchase history, newest first.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<PurchaseRecord>>, ApiError> {
    let filter = query.into_filter()?;
    let records = state.run(move |engine| engine.purchases(&filter)).await?;
    Ok(Json(records))
}

/// Get one purchase record.
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(purchase_id): Path<PurchaseId>,
) -> Result<Json<PurchaseRecord>, ApiError> {
    let record = state.run(move |engine| engine.purchase(purchase_id)).await?;
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: usize) -> ListTransactionsQuery {
        ListTransactionsQuery {
            buyer_id: Some(BuyerId::new(2)),
            seller_id: None,
            product_id: None,
            limit,
            offset: 5,
        }
    }

    #[test]
    fn filter_keeps_the_query() {
        let filter = query(10).into_filter().unwrap();
        assert_eq!(filter.buyer_id, Some(BuyerId::new(2)));
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.offset, 5);
    }

    #[test]
    fn limit_out_of_range_is_rejected() {
        assert!(query(0).into_filter().is_err());
        assert!(query(MAX_LIST_LIMIT + 1).into_filter().is_err());
        assert!(query(MAX_LIST_LIMIT).into_filter().is_ok());
    }
}
