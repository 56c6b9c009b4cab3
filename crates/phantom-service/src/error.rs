//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use phantom_engine::{EngineError, ErrorKind};
use serde::Serialize;
use serde_json::json;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request - invalid input caught before the engine.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An engine operation failed; the status follows its error kind.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Internal server error outside the engine.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// HTTP status for an engine error kind.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::BusinessRule => StatusCode::BAD_REQUEST,
        ErrorKind::TransientConflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn engine_code(err: &EngineError) -> &'static str {
    match err {
        EngineError::BuyerNotFound { .. } => "buyer_not_found",
        EngineError::SellerNotFound { .. } => "seller_not_found",
        EngineError::ProductNotFoundForSeller { .. } | EngineError::ProductNotFound { .. } => {
            "product_not_found"
        }
        EngineError::PurchaseNotFound { .. } => "purchase_not_found",
        EngineError::InsufficientStock { .. } => "insufficient_stock",
        EngineError::InsufficientBalance { .. } => "insufficient_balance",
        EngineError::InvalidQuantity { .. } => "invalid_quantity",
        EngineError::EmptyPurchase => "empty_purchase",
        EngineError::InvalidBatchSize { .. } => "invalid_batch_size",
        EngineError::DuplicateProductNames { .. } => "duplicate_product_names",
        EngineError::DuplicateProductIds { .. } => "duplicate_product_ids",
        EngineError::ProductNameTaken { .. } => "product_name_taken",
        EngineError::InvalidPrice { .. } => "invalid_price",
        EngineError::AmountOverflow(_) => "amount_overflow",
        EngineError::TransientConflict { .. } => "transient_conflict",
        EngineError::DeadlineExceeded { .. } => "deadline_exceeded",
        EngineError::Store(_) | EngineError::Internal(_) => "internal_error",
    }
}

fn engine_details(err: &EngineError) -> Option<serde_json::Value> {
    match err {
        EngineError::InsufficientStock {
            product_id,
            product_name,
            available,
            requested,
        } => Some(json!({
            "product_id": product_id,
            "product_name": product_name,
            "available": available,
            "requested": requested,
        })),
        EngineError::InsufficientBalance {
            buyer_id,
            balance,
            required,
        } => Some(json!({
            "buyer_id": buyer_id,
            "balance": balance,
            "required": required,
        })),
        EngineError::DuplicateProductNames { names }
        | EngineError::ProductNameTaken { names, .. } => Some(json!({ "names": names })),
        EngineError::TransientConflict { .. } | EngineError::DeadlineExceeded { .. } => {
            Some(json!({ "retryable": true }))
        }
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Engine(err) if err.kind() == ErrorKind::Internal => {
                tracing::error!(error = %err, "Engine failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            Self::Engine(err) => (
                status_for(err.kind()),
                engine_code(err),
                err.to_string(),
                engine_details(err),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
