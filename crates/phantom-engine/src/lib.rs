//! Transactional consistency engine for the phantom mask marketplace.
//!
//! The engine moves stock and money between buyers, sellers, and products
//! held in a [`LedgerStore`]. Each operation is one unit of work that passes
//! through four stages:
//!
//! 1. **Validation**: lock-free reads that reject obviously bad requests.
//! 2. **Lock-and-recheck**: exclusive row locks in one global order, then the
//!    same checks again on the locked values.
//! 3. **Commit**: every write for the operation, committed atomically.
//! 4. **Conflict classification**: store contention is reported as a
//!    retryable [`ErrorKind::TransientConflict`], never as a business error.
//!
//! The engine never retries on its own. Retry policy belongs to the caller.
//!
//! # Example
//!
//! ```
//! use phantom_core::{Decimal, NewBuyer, NewProduct, NewSeller, PurchaseRequest};
//! use phantom_engine::{Engine, EngineConfig};
//! use phantom_store::{LedgerStore, MemoryStore};
//!
//! let engine = Engine::new(MemoryStore::new(), EngineConfig::default());
//! let buyer = engine.store().insert_buyer(NewBuyer::new("Ann", Decimal::from(100))).unwrap();
//! let seller = engine.store().insert_seller(NewSeller::new("Corner", Decimal::from(50))).unwrap();
//! let product = engine
//!     .store()
//!     .insert_product(NewProduct {
//!         seller_id: seller.id,
//!         name: "MaskT (black) (10 per pack)".into(),
//!         price: Decimal::new(500, 2),
//!         stock_quantity: 10,
//!     })
//!     .unwrap();
//!
//! let record = engine
//!     .purchase_single(PurchaseRequest {
//!         buyer_id: buyer.id,
//!         seller_id: seller.id,
//!         product_id: product.id,
//!         quantity: 2,
//!     })
//!     .unwrap();
//! assert_eq!(record.total_amount, Decimal::new(1000, 2));
//! assert_eq!(engine.buyer(buyer.id).unwrap().cash_balance, Decimal::from(90));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod classify;
mod commit;
pub mod config;
mod engine;
pub mod error;
pub mod flow;
pub mod inventory;
mod lock;
mod purchase;
pub mod validate;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, ErrorKind, Result};
pub use flow::PurchasePhase;
pub use inventory::{CatalogBatch, StockAdjustment, MAX_BATCH_ITEMS};
pub use validate::ValidatedItem;

pub use phantom_store::LedgerStore;
