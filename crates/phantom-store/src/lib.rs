//! Ledger storage for the phantom mask marketplace.
//!
//! This crate is the single consistent backing store the purchase engine runs
//! against. It offers two capabilities:
//!
//! - [`LedgerStore`]: shared handle with committed reads and the loading path
//!   (creating buyers, sellers, and products).
//! - [`UnitOfWork`]: one transaction with plain reads, row-locking reads, and
//!   buffered writes applied atomically on commit.
//!
//! # Backends
//!
//! - [`MemoryStore`]: committed tables in memory, row locks with a wait-for
//!   graph so deadlocks are reported instead of waited out.
//! - `RocksStore` (feature `rocksdb-backend`): pessimistic RocksDB
//!   `TransactionDB` with one column family per record type.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use phantom_core::{Decimal, EntityKey, NewBuyer};
//! use phantom_store::{LedgerStore, MemoryStore, UnitOfWork};
//!
//! let store = MemoryStore::new();
//! let buyer = store.insert_buyer(NewBuyer::new("Ann", Decimal::from(100))).unwrap();
//!
//! let mut unit = store.begin(Duration::from_secs(1)).unwrap();
//! let mut locked = unit
//!     .lock_for_update(EntityKey::Buyer(buyer.id))
//!     .unwrap()
//!     .and_then(|row| row.into_buyer())
//!     .unwrap();
//! locked.cash_balance -= Decimal::from(10);
//! unit.update_buyer(&locked).unwrap();
//! unit.commit().unwrap();
//!
//! let after = store.get_buyer(buyer.id).unwrap().unwrap();
//! assert_eq!(after.cash_balance, Decimal::from(90));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod checks;
pub mod error;
pub mod locks;
pub mod memory;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::{MemoryStore, MemoryUnit};
#[cfg(feature = "rocksdb-backend")]
pub use rocks::{RocksStore, RocksUnit};

use std::time::Duration;

use phantom_core::{
    Buyer, BuyerId, EntityKey, EntitySnapshot, NewBuyer, NewProduct, NewPurchase, NewSeller,
    Product, ProductId, PurchaseFilter, PurchaseId, PurchaseRecord, Seller, SellerId,
};

/// Lock wait used by the loading path when it needs a row lock.
pub(crate) const LOADING_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// The shared store handle.
///
/// Reads on this trait see committed data only and never take row locks.
pub trait LedgerStore: Send + Sync {
    /// A unit of work borrowed from this store.
    type Unit<'a>: UnitOfWork
    where
        Self: 'a;

    /// Start a unit of work whose lock waits give up after `lock_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot start a transaction.
    fn begin(&self, lock_timeout: Duration) -> Result<Self::Unit<'_>>;

    // =========================================================================
    // Loading path
    // =========================================================================

    /// Create a buyer and assign its ID.
    ///
    /// # Errors
    ///
    /// `StoreError::Constraint` if the balance is negative.
    fn insert_buyer(&self, buyer: NewBuyer) -> Result<Buyer>;

    /// Create a seller and assign its ID.
    ///
    /// # Errors
    ///
    /// `StoreError::Constraint` if the balance is negative.
    fn insert_seller(&self, seller: NewSeller) -> Result<Seller>;

    /// Create a product and assign its ID.
    ///
    /// Takes the seller lock, so it waits for any unit editing that seller's
    /// catalog and sees the names that unit commits.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the seller does not exist.
    /// - `StoreError::LockTimeout` if the seller stays locked too long.
    /// - `StoreError::Constraint` if the name is taken within the seller or
    ///   the price is not positive.
    fn insert_product(&self, product: NewProduct) -> Result<Product>;

    // =========================================================================
    // Committed reads
    // =========================================================================

    /// Get a buyer by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_buyer(&self, id: BuyerId) -> Result<Option<Buyer>>;

    /// Get a seller by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_seller(&self, id: SellerId) -> Result<Option<Seller>>;

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Get a purchase record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_purchase(&self, id: PurchaseId) -> Result<Option<PurchaseRecord>>;

    /// List a seller's products in ID order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_products(&self, seller_id: SellerId) -> Result<Vec<Product>>;

    /// List purchase records in descending ID order.
    ///
    /// IDs are allocated when a unit inserts the record, so two units
    /// committing concurrently may land out of ID order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<PurchaseRecord>>;
}

/// One transaction against the store.
///
/// Writes are buffered and become visible to others only on [`commit`].
/// Dropping a unit without committing rolls it back and releases its locks.
///
/// [`commit`]: UnitOfWork::commit
pub trait UnitOfWork {
    // =========================================================================
    // Lookups (no locks)
    // =========================================================================

    /// Read a buyer.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_buyer(&self, id: BuyerId) -> Result<Option<Buyer>>;

    /// Read a seller.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_seller(&self, id: SellerId) -> Result<Option<Seller>>;

    /// Read a product, only if it belongs to `seller_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_product(&self, id: ProductId, seller_id: SellerId) -> Result<Option<Product>>;

    /// Find a seller's product by exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_product_by_name(&self, seller_id: SellerId, name: &str) -> Result<Option<Product>>;

    // =========================================================================
    // Locking
    // =========================================================================

    /// Take an exclusive lock on a row and return its current value.
    ///
    /// Returns `Ok(None)` if the row does not exist. Locks are held until
    /// commit or rollback. Locking a row twice is a no-op.
    ///
    /// # Errors
    ///
    /// - `StoreError::LockTimeout` if the lock could not be taken in time.
    /// - `StoreError::Deadlock` if waiting would deadlock.
    fn lock_for_update(&mut self, key: EntityKey) -> Result<Option<EntitySnapshot>>;

    /// Bound the wait of later [`lock_for_update`](Self::lock_for_update)
    /// calls by `wait`.
    ///
    /// The `RocksDB` backend fixes the wait when the transaction begins and
    /// keeps it.
    fn set_lock_wait(&mut self, wait: Duration);

    // =========================================================================
    // Writes (buffered until commit)
    // =========================================================================

    /// Overwrite a locked buyer row.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotLocked` if this unit does not hold the row lock.
    /// - `StoreError::Constraint` if the balance is negative.
    fn update_buyer(&mut self, buyer: &Buyer) -> Result<()>;

    /// Overwrite a locked seller row.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotLocked` if this unit does not hold the row lock.
    /// - `StoreError::Constraint` if the balance is negative.
    fn update_seller(&mut self, seller: &Seller) -> Result<()>;

    /// Overwrite a locked product row.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotLocked` if this unit does not hold the row lock.
    /// - `StoreError::Constraint` if the owner changed, the price is not
    ///   positive, or the name collides with another product of the seller.
    fn update_product(&mut self, product: &Product) -> Result<()>;

    /// Insert a product for a seller this unit has locked.
    ///
    /// The new row is locked by this unit.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotLocked` if this unit does not hold the seller lock.
    /// - `StoreError::Constraint` if the name is taken or the price is not positive.
    fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    /// Append a purchase record.
    ///
    /// The buyer, seller, and product rows must all be locked by this unit.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotLocked` if any referenced row is not locked.
    /// - `StoreError::Constraint` if the quantity is zero or the total is
    ///   not `unit_price * quantity`.
    fn insert_purchase(&mut self, purchase: NewPurchase) -> Result<PurchaseRecord>;

    // =========================================================================
    // Completion
    // =========================================================================

    /// Apply every buffered write atomically and release all locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to commit; nothing is applied.
    fn commit(self) -> Result<()>;

    /// Discard every buffered write and release all locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to roll back.
    fn rollback(self) -> Result<()>;
}
