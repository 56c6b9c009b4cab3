//! Product (mask) records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ProductId, SellerId};

/// A product owned by exactly one seller.
///
/// Stock is unsigned, so a negative quantity cannot be represented; callers
/// subtract with [`Product::remove_stock`] which refuses to underflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,

    /// Owning seller. Never changes.
    pub seller_id: SellerId,

    /// Name, unique within the seller.
    pub name: String,

    /// Unit price, strictly positive.
    pub price: Decimal,

    /// Units in stock.
    pub stock_quantity: u32,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether this product is listed by `seller_id`.
    #[must_use]
    pub fn belongs_to(&self, seller_id: SellerId) -> bool {
        self.seller_id == seller_id
    }

    /// Whether `quantity` units are available.
    #[must_use]
    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock_quantity >= quantity
    }

    /// Stock after removing `quantity` units, or `None` if that would go negative.
    #[must_use]
    pub fn remove_stock(&self, quantity: u32) -> Option<u32> {
        self.stock_quantity.checked_sub(quantity)
    }

    /// Stock after applying a signed change, or `None` if out of range.
    #[must_use]
    pub fn apply_stock_delta(&self, delta: i64) -> Option<u32> {
        let next = i64::from(self.stock_quantity).checked_add(delta)?;
        u32::try_from(next).ok()
    }
}

/// Input for inserting a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    /// Owning seller.
    pub seller_id: SellerId,
    /// Name, unique within the seller.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Initial stock.
    pub stock_quantity: u32,
}

/// One entry of a batch catalog change: an update when `product_id` is set,
/// otherwise a create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    /// Existing product to update.
    #[serde(default)]
    pub product_id: Option<ProductId>,
    /// Name, unique within the seller.
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Stock level to set.
    pub stock_quantity: u32,
}
