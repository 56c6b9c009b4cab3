//! Core types for the phantom mask marketplace ledger.
//!
//! This crate provides the records and vocabulary shared by the store, the
//! engine, and the HTTP adapter:
//!
//! - **Identifiers**: `SellerId`, `ProductId`, `BuyerId`, `PurchaseId`
//! - **Records**: `Seller`, `Product`, `Buyer`, `PurchaseRecord`
//! - **Requests**: `PurchaseRequest`, `MultiPurchaseRequest`, `ProductDraft`
//! - **Locking**: `EntityKey` and its global lock order
//! - **Money**: exact `Decimal` arithmetic helpers
//!
//! # Invariants
//!
//! - Product stock is a `u32` and can never be negative.
//! - Buyer and seller balances are never negative between commits.
//! - `PurchaseRecord::total_amount == unit_price * quantity` exactly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod buyer;
pub mod deadline;
pub mod entity;
pub mod ids;
pub mod money;
pub mod product;
pub mod purchase;
pub mod seller;

pub use buyer::{Buyer, NewBuyer};
pub use deadline::Deadline;
pub use entity::{EntityKey, EntityKind, EntitySnapshot};
pub use ids::{BuyerId, IdError, ProductId, PurchaseId, SellerId};
pub use product::{NewProduct, Product, ProductDraft};
pub use purchase::{
    MultiPurchaseReceipt, MultiPurchaseRequest, NewPurchase, PurchaseFilter, PurchaseLine,
    PurchaseRecord, PurchaseRequest,
};
pub use rust_decimal::Decimal;
pub use seller::{DailyHours, NewSeller, OpeningHours, Seller};
