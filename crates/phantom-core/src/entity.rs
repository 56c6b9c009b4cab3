//! Entity keys and the global lock order.
//!
//! Every call site that locks more than one row sorts the keys first. The
//! derived `Ord` on [`EntityKey`] ranks by entity kind (buyer, then seller,
//! then product) and then by id, which gives one total order for all
//! transactions and rules out circular waits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Buyer, BuyerId, Product, ProductId, Seller, SellerId};

/// Kinds of lockable rows, in lock rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A buyer row.
    Buyer,
    /// A seller row.
    Seller,
    /// A product row.
    Product,
}

impl EntityKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Product => "product",
        }
    }
}

/// The key of a lockable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityKey {
    /// A buyer row.
    Buyer(BuyerId),
    /// A seller row.
    Seller(SellerId),
    /// A product row.
    Product(ProductId),
}

impl EntityKey {
    /// The kind of row.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Buyer(_) => EntityKind::Buyer,
            Self::Seller(_) => EntityKind::Seller,
            Self::Product(_) => EntityKind::Product,
        }
    }

    /// The raw id.
    #[must_use]
    pub const fn raw_id(&self) -> u64 {
        match self {
            Self::Buyer(id) => id.get(),
            Self::Seller(id) => id.get(),
            Self::Product(id) => id.get(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.raw_id())
    }
}

impl From<BuyerId> for EntityKey {
    fn from(id: BuyerId) -> Self {
        Self::Buyer(id)
    }
}

impl From<SellerId> for EntityKey {
    fn from(id: SellerId) -> Self {
        Self::Seller(id)
    }
}

impl From<ProductId> for EntityKey {
    fn from(id: ProductId) -> Self {
        Self::Product(id)
    }
}

/// The current value of a row, as returned by a locking read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntitySnapshot {
    /// A buyer row.
    Buyer(Buyer),
    /// A seller row.
    Seller(Seller),
    /// A product row.
    Product(Product),
}

impl EntitySnapshot {
    /// The key of the row.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Buyer(b) => EntityKey::Buyer(b.id),
            Self::Seller(s) => EntityKey::Seller(s.id),
            Self::Product(p) => EntityKey::Product(p.id),
        }
    }

    /// The buyer, if this is a buyer row.
    #[must_use]
    pub fn into_buyer(self) -> Option<Buyer> {
        match self {
            Self::Buyer(b) => Some(b),
            _ => None,
        }
    }

    /// The seller, if this is a seller row.
    #[must_use]
    pub fn into_seller(self) -> Option<Seller> {
        match self {
            Self::Seller(s) => Some(s),
            _ => None,
        }
    }

    /// The product, if this is a product row.
    #[must_use]
    pub fn into_product(self) -> Option<Product> {
        match self {
            Self::Product(p) => Some(p),
            _ => None,
        }
    }
}
