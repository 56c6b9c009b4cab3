//! Error types for the purchase engine.

use phantom_core::{BuyerId, Decimal, ProductId, PurchaseId, SellerId};
use phantom_store::StoreError;
use serde::Serialize;

use crate::flow::PurchasePhase;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// What a caller should do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced row is missing. Do not retry.
    NotFound,
    /// The request breaks a business rule. Do not retry unchanged.
    BusinessRule,
    /// Nothing changed; running the whole operation again is safe.
    TransientConflict,
    /// Unexpected store failure. Nothing changed.
    Internal,
}

/// Errors returned by the engine.
///
/// Every error is returned after the unit of work rolled back.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Buyer does not exist.
    #[error("buyer not found: {buyer_id}")]
    BuyerNotFound {
        /// The missing buyer.
        buyer_id: BuyerId,
    },

    /// Seller does not exist.
    #[error("seller not found: {seller_id}")]
    SellerNotFound {
        /// The missing seller.
        seller_id: SellerId,
    },

    /// Product does not exist or is listed by another seller.
    #[error("product {product_id} not found for seller {seller_id}")]
    ProductNotFoundForSeller {
        /// The requested product.
        product_id: ProductId,
        /// The seller it was requested from.
        seller_id: SellerId,
    },

    /// Product does not exist.
    #[error("product not found: {product_id}")]
    ProductNotFound {
        /// The missing product.
        product_id: ProductId,
    },

    /// Purchase record does not exist.
    #[error("purchase not found: {purchase_id}")]
    PurchaseNotFound {
        /// The missing record.
        purchase_id: PurchaseId,
    },

    /// Not enough units in stock.
    #[error(
        "insufficient stock for {product_name:?}: available={available}, requested={requested}"
    )]
    InsufficientStock {
        /// The product.
        product_id: ProductId,
        /// Its name.
        product_name: String,
        /// Units in stock.
        available: u32,
        /// Units the operation needed.
        requested: u64,
    },

    /// Buyer cannot pay the total.
    #[error("insufficient balance for buyer {buyer_id}: balance={balance}, required={required}")]
    InsufficientBalance {
        /// The buyer.
        buyer_id: BuyerId,
        /// Current balance.
        balance: Decimal,
        /// Amount the operation needed.
        required: Decimal,
    },

    /// Purchase quantities must be positive.
    #[error("quantity must be positive, got {quantity}")]
    InvalidQuantity {
        /// The rejected quantity.
        quantity: u32,
    },

    /// A purchase needs at least one line.
    #[error("purchase has no items")]
    EmptyPurchase,

    /// A catalog batch is empty or too large.
    #[error("batch must contain between 1 and {max} items, got {count}")]
    InvalidBatchSize {
        /// Items sent.
        count: usize,
        /// Largest batch accepted.
        max: usize,
    },

    /// A catalog batch names the same product twice.
    #[error("duplicate product names in request: {}", names.join(", "))]
    DuplicateProductNames {
        /// The repeated names.
        names: Vec<String>,
    },

    /// A catalog batch edits the same product twice.
    #[error("duplicate product ids in request: {ids:?}")]
    DuplicateProductIds {
        /// The repeated ids.
        ids: Vec<ProductId>,
    },

    /// The seller already lists products with these names.
    #[error("seller {seller_id} already lists: {}", names.join(", "))]
    ProductNameTaken {
        /// The seller.
        seller_id: SellerId,
        /// The colliding names.
        names: Vec<String>,
    },

    /// Prices must be strictly positive.
    #[error("price of {name:?} must be positive, got {price}")]
    InvalidPrice {
        /// Product name.
        name: String,
        /// The rejected price.
        price: Decimal,
    },

    /// An amount or quantity does not fit its type.
    #[error("amount out of range: {0}")]
    AmountOverflow(String),

    /// Lock contention in the store; the unit of work was rolled back.
    #[error("transient conflict, retry: {reason}")]
    TransientConflict {
        /// What the store reported.
        reason: String,
    },

    /// The caller's deadline passed; the unit of work was rolled back.
    #[error("deadline exceeded before {phase}")]
    DeadlineExceeded {
        /// The phase that was about to start.
        phase: PurchasePhase,
    },

    /// The store failed for a reason other than contention.
    #[error("store error: {0}")]
    Store(StoreError),

    /// An engine invariant did not hold.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Classify the error for the caller.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BuyerNotFound { .. }
            | Self::SellerNotFound { .. }
            | Self::ProductNotFoundForSeller { .. }
            | Self::ProductNotFound { .. }
            | Self::PurchaseNotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientStock { .. }
            | Self::InsufficientBalance { .. }
            | Self::InvalidQuantity { .. }
            | Self::EmptyPurchase
            | Self::InvalidBatchSize { .. }
            | Self::DuplicateProductNames { .. }
            | Self::DuplicateProductIds { .. }
            | Self::ProductNameTaken { .. }
            | Self::InvalidPrice { .. }
            | Self::AmountOverflow(_) => ErrorKind::BusinessRule,
            Self::TransientConflict { .. } | Self::DeadlineExceeded { .. } => {
                ErrorKind::TransientConflict
            }
            Self::Store(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether running the same operation again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientConflict)
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        crate::classify::classify(err)
    }
}
