//! Purchase records and purchase requests.
//!
//! A [`PurchaseRecord`] is append-only: the engine writes one per committed
//! line item and nothing ever rewrites it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BuyerId, ProductId, PurchaseId, SellerId};

/// An immutable record of one committed purchase line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Record ID.
    pub id: PurchaseId,

    /// Who paid.
    pub buyer_id: BuyerId,

    /// Who was paid.
    pub seller_id: SellerId,

    /// What was bought.
    pub product_id: ProductId,

    /// Units bought, always positive.
    pub quantity: u32,

    /// Product price at the moment of commit.
    pub unit_price: Decimal,

    /// Exactly `unit_price * quantity`.
    pub total_amount: Decimal,

    /// Wall-clock time of commit.
    pub purchased_at: DateTime<Utc>,
}

/// A purchase record before the store assigns its ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchase {
    /// Who paid.
    pub buyer_id: BuyerId,
    /// Who was paid.
    pub seller_id: SellerId,
    /// What was bought.
    pub product_id: ProductId,
    /// Units bought.
    pub quantity: u32,
    /// Price snapshot.
    pub unit_price: Decimal,
    /// `unit_price * quantity`.
    pub total_amount: Decimal,
    /// Commit time.
    pub purchased_at: DateTime<Utc>,
}

impl NewPurchase {
    /// Attach an ID.
    #[must_use]
    pub fn with_id(self, id: PurchaseId) -> PurchaseRecord {
        PurchaseRecord {
            id,
            buyer_id: self.buyer_id,
            seller_id: self.seller_id,
            product_id: self.product_id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_amount: self.total_amount,
            purchased_at: self.purchased_at,
        }
    }
}

/// A single-item purchase request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Buyer paying for the item.
    pub buyer_id: BuyerId,
    /// Seller listing the product.
    pub seller_id: SellerId,
    /// Product to buy.
    pub product_id: ProductId,
    /// Units to buy, must be positive.
    pub quantity: u32,
}

impl PurchaseRequest {
    /// The line item part of the request.
    #[must_use]
    pub const fn line(&self) -> PurchaseLine {
        PurchaseLine {
            seller_id: self.seller_id,
            product_id: self.product_id,
            quantity: self.quantity,
        }
    }
}

/// One line of a multi-seller purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    /// Seller listing the product.
    pub seller_id: SellerId,
    /// Product to buy.
    pub product_id: ProductId,
    /// Units to buy, must be positive.
    pub quantity: u32,
}

/// A purchase spanning several sellers, paid by one buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiPurchaseRequest {
    /// Buyer paying for every line.
    pub buyer_id: BuyerId,
    /// Lines, must be non-empty.
    pub items: Vec<PurchaseLine>,
}

/// The result of a committed multi-seller purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPurchaseReceipt {
    /// Buyer that paid.
    pub buyer_id: BuyerId,
    /// One record per requested line, in request order.
    pub records: Vec<PurchaseRecord>,
    /// Sum of the records' totals; the amount charged to the buyer.
    pub total_amount: Decimal,
}

/// Filter for listing purchase history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseFilter {
    /// Only records paid by this buyer.
    #[serde(default)]
    pub buyer_id: Option<BuyerId>,
    /// Only records paid to this seller.
    #[serde(default)]
    pub seller_id: Option<SellerId>,
    /// Only records for this product.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    /// Maximum number of records.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Records to skip (newest first).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

impl PurchaseFilter {
    /// Everything, newest first, up to `limit` records.
    #[must_use]
    pub fn all(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Only records paid by `buyer_id`.
    #[must_use]
    pub fn for_buyer(buyer_id: BuyerId, limit: usize) -> Self {
        Self {
            buyer_id: Some(buyer_id),
            limit,
            ..Self::default()
        }
    }

    /// Whether a record passes the id filters (pagination not included).
    #[must_use]
    pub fn matches(&self, record: &PurchaseRecord) -> bool {
        self.buyer_id.map_or(true, |id| record.buyer_id == id)
            && self.seller_id.map_or(true, |id| record.seller_id == id)
            && self.product_id.map_or(true, |id| record.product_id == id)
    }
}
