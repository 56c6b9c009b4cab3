//! In-memory storage implementation.
//!
//! Committed rows live behind one `RwLock`. A unit of work buffers its writes
//! privately and applies them under the write lock in a single step, so no
//! reader ever sees half a commit. Row locks come from a [`LockTable`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;

use phantom_core::{
    Buyer, BuyerId, EntityKey, EntitySnapshot, NewBuyer, NewProduct, NewPurchase, NewSeller,
    Product, ProductId, PurchaseFilter, PurchaseId, PurchaseRecord, Seller, SellerId,
};

use crate::checks;
use crate::error::{Result, StoreError};
use crate::locks::{LockTable, UnitId};
use crate::{LedgerStore, UnitOfWork, LOADING_LOCK_TIMEOUT};

#[derive(Debug, Default)]
struct Tables {
    buyers: BTreeMap<BuyerId, Buyer>,
    sellers: BTreeMap<SellerId, Seller>,
    products: BTreeMap<ProductId, Product>,
    purchases: BTreeMap<PurchaseId, PurchaseRecord>,
}

/// Monotonic ID allocation. IDs burned by a rolled-back unit are not reused.
#[derive(Debug)]
struct Sequences {
    buyers: AtomicU64,
    sellers: AtomicU64,
    products: AtomicU64,
    purchases: AtomicU64,
    units: AtomicU64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            buyers: AtomicU64::new(1),
            sellers: AtomicU64::new(1),
            products: AtomicU64::new(1),
            purchases: AtomicU64::new(1),
            units: AtomicU64::new(1),
        }
    }
}

fn next(seq: &AtomicU64) -> u64 {
    seq.fetch_add(1, Ordering::Relaxed)
}

/// In-memory ledger store with row locking.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    locks: LockTable,
    sequences: Sequences,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of row locks currently held by open units of work.
    #[must_use]
    pub fn held_locks(&self) -> usize {
        self.locks.held_count()
    }
}

impl LedgerStore for MemoryStore {
    type Unit<'a> = MemoryUnit<'a>;

    fn begin(&self, lock_timeout: Duration) -> Result<MemoryUnit<'_>> {
        Ok(MemoryUnit {
            store: self,
            id: next(&self.sequences.units),
            lock_timeout,
            held: BTreeSet::new(),
            pending: Pending::default(),
            finished: false,
        })
    }

    // =========================================================================
    // Loading path
    // =========================================================================

    fn insert_buyer(&self, buyer: NewBuyer) -> Result<Buyer> {
        let now = Utc::now();
        let row = Buyer {
            id: BuyerId::new(next(&self.sequences.buyers)),
            name: buyer.name,
            cash_balance: buyer.cash_balance,
            created_at: now,
            updated_at: now,
        };
        checks::buyer(&row)?;
        self.tables.write().buyers.insert(row.id, row.clone());
        Ok(row)
    }

    fn insert_seller(&self, seller: NewSeller) -> Result<Seller> {
        let now = Utc::now();
        let row = Seller {
            id: SellerId::new(next(&self.sequences.sellers)),
            name: seller.name,
            cash_balance: seller.cash_balance,
            opening_hours: seller.opening_hours,
            created_at: now,
            updated_at: now,
        };
        checks::seller(&row)?;
        self.tables.write().sellers.insert(row.id, row.clone());
        Ok(row)
    }

    fn insert_product(&self, product: NewProduct) -> Result<Product> {
        // Same path as a catalog edit: the name check needs the seller lock
        // and must see other units' pending inserts.
        let key = EntityKey::Seller(product.seller_id);
        let mut unit = self.begin(LOADING_LOCK_TIMEOUT)?;
        unit.lock_for_update(key)?.ok_or(StoreError::NotFound { key })?;
        let row = unit.insert_product(product)?;
        unit.commit()?;
        Ok(row)
    }

    // =========================================================================
    // Committed reads
    // =========================================================================

    fn get_buyer(&self, id: BuyerId) -> Result<Option<Buyer>> {
        Ok(self.tables.read().buyers.get(&id).cloned())
    }

    fn get_seller(&self, id: SellerId) -> Result<Option<Seller>> {
        Ok(self.tables.read().sellers.get(&id).cloned())
    }

    fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().products.get(&id).cloned())
    }

    fn get_purchase(&self, id: PurchaseId) -> Result<Option<PurchaseRecord>> {
        Ok(self.tables.read().purchases.get(&id).cloned())
    }

    fn list_products(&self, seller_id: SellerId) -> Result<Vec<Product>> {
        Ok(self
            .tables
            .read()
            .products
            .values()
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .collect())
    }

    fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<PurchaseRecord>> {
        Ok(self
            .tables
            .read()
            .purchases
            .values()
            .rev()
            .filter(|r| filter.matches(r))
            .skip(filter.offset)
            .take(filter.limit)
            .cloned()
            .collect())
    }
}

/// Writes buffered by a unit of work.
#[derive(Debug, Default)]
struct Pending {
    buyers: BTreeMap<BuyerId, Buyer>,
    sellers: BTreeMap<SellerId, Seller>,
    products: BTreeMap<ProductId, Product>,
    purchases: Vec<PurchaseRecord>,
}

/// A unit of work against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryUnit<'a> {
    store: &'a MemoryStore,
    id: UnitId,
    lock_timeout: Duration,
    held: BTreeSet<EntityKey>,
    pending: Pending,
    finished: bool,
}

impl MemoryUnit<'_> {
    /// Rows this unit has locked, in lock order.
    #[must_use]
    pub fn held(&self) -> &BTreeSet<EntityKey> {
        &self.held
    }

    fn require_lock(&self, key: EntityKey) -> Result<()> {
        if self.held.contains(&key) {
            Ok(())
        } else {
            Err(StoreError::NotLocked { key })
        }
    }

    fn snapshot(&self, key: EntityKey) -> Option<EntitySnapshot> {
        let tables = self.store.tables.read();
        match key {
            EntityKey::Buyer(id) => self
                .pending
                .buyers
                .get(&id)
                .or_else(|| tables.buyers.get(&id))
                .cloned()
                .map(EntitySnapshot::Buyer),
            EntityKey::Seller(id) => self
                .pending
                .sellers
                .get(&id)
                .or_else(|| tables.sellers.get(&id))
                .cloned()
                .map(EntitySnapshot::Seller),
            EntityKey::Product(id) => self
                .pending
                .products
                .get(&id)
                .or_else(|| tables.products.get(&id))
                .cloned()
                .map(EntitySnapshot::Product),
        }
    }

    /// Whether another product of the seller, as this unit sees it, has `name`.
    fn name_taken(&self, seller_id: SellerId, name: &str, except: Option<ProductId>) -> bool {
        let tables = self.store.tables.read();
        let pending_hit = self
            .pending
            .products
            .values()
            .any(|p| p.seller_id == seller_id && p.name == name && Some(p.id) != except);
        let committed_hit = tables.products.values().any(|p| {
            p.seller_id == seller_id
                && p.name == name
                && Some(p.id) != except
                && !self.pending.products.contains_key(&p.id)
        });
        pending_hit || committed_hit
    }

    fn release(&mut self) {
        if !self.finished {
            self.finished = true;
            let held = std::mem::take(&mut self.held);
            self.store.locks.release_all(self.id, held);
        }
    }
}

impl UnitOfWork for MemoryUnit<'_> {
    fn find_buyer(&self, id: BuyerId) -> Result<Option<Buyer>> {
        Ok(self
            .snapshot(EntityKey::Buyer(id))
            .and_then(EntitySnapshot::into_buyer))
    }

    fn find_seller(&self, id: SellerId) -> Result<Option<Seller>> {
        Ok(self
            .snapshot(EntityKey::Seller(id))
            .and_then(EntitySnapshot::into_seller))
    }

    fn find_product(&self, id: ProductId, seller_id: SellerId) -> Result<Option<Product>> {
        Ok(self
            .snapshot(EntityKey::Product(id))
            .and_then(EntitySnapshot::into_product)
            .filter(|p| p.belongs_to(seller_id)))
    }

    fn find_product_by_name(&self, seller_id: SellerId, name: &str) -> Result<Option<Product>> {
        if let Some(found) = self
            .pending
            .products
            .values()
            .find(|p| p.seller_id == seller_id && p.name == name)
        {
            return Ok(Some(found.clone()));
        }
        let tables = self.store.tables.read();
        Ok(tables
            .products
            .values()
            .find(|p| {
                p.seller_id == seller_id
                    && p.name == name
                    && !self.pending.products.contains_key(&p.id)
            })
            .cloned())
    }

    fn lock_for_update(&mut self, key: EntityKey) -> Result<Option<EntitySnapshot>> {
        if !self.held.contains(&key) {
            self.store.locks.acquire(key, self.id, self.lock_timeout)?;
            self.held.insert(key);
        }

        let snapshot = self.snapshot(key);
        if snapshot.is_none() {
            self.held.remove(&key);
            self.store.locks.release(key, self.id);
        }
        Ok(snapshot)
    }

    fn set_lock_wait(&mut self, wait: Duration) {
        self.lock_timeout = wait;
    }

    fn update_buyer(&mut self, buyer: &Buyer) -> Result<()> {
        let key = EntityKey::Buyer(buyer.id);
        self.require_lock(key)?;
        checks::buyer(buyer)?;
        let mut row = buyer.clone();
        row.updated_at = Utc::now();
        self.pending.buyers.insert(row.id, row);
        Ok(())
    }

    fn update_seller(&mut self, seller: &Seller) -> Result<()> {
        let key = EntityKey::Seller(seller.id);
        self.require_lock(key)?;
        checks::seller(seller)?;
        let mut row = seller.clone();
        row.updated_at = Utc::now();
        self.pending.sellers.insert(row.id, row);
        Ok(())
    }

    fn update_product(&mut self, product: &Product) -> Result<()> {
        let key = EntityKey::Product(product.id);
        self.require_lock(key)?;
        checks::product(product)?;

        let current = self
            .snapshot(key)
            .and_then(EntitySnapshot::into_product)
            .ok_or(StoreError::NotFound { key })?;
        if current.seller_id != product.seller_id {
            return Err(StoreError::Constraint(format!(
                "product {} cannot move from seller {} to {}",
                product.id, current.seller_id, product.seller_id
            )));
        }
        if self.name_taken(product.seller_id, &product.name, Some(product.id)) {
            return Err(StoreError::Constraint(format!(
                "seller {} already lists {:?}",
                product.seller_id, product.name
            )));
        }

        let mut row = product.clone();
        row.updated_at = Utc::now();
        self.pending.products.insert(row.id, row);
        Ok(())
    }

    fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        self.require_lock(EntityKey::Seller(product.seller_id))?;
        checks::price(&product.name, product.price)?;
        if self.name_taken(product.seller_id, &product.name, None) {
            return Err(StoreError::Constraint(format!(
                "seller {} already lists {:?}",
                product.seller_id, product.name
            )));
        }

        let now = Utc::now();
        let row = Product {
            id: ProductId::new(next(&self.store.sequences.products)),
            seller_id: product.seller_id,
            name: product.name,
            price: product.price,
            stock_quantity: product.stock_quantity,
            created_at: now,
            updated_at: now,
        };

        // Nobody else knows the new id yet, so this never waits.
        let key = EntityKey::Product(row.id);
        self.store.locks.acquire(key, self.id, self.lock_timeout)?;
        self.held.insert(key);
        self.pending.products.insert(row.id, row.clone());
        Ok(row)
    }

    fn insert_purchase(&mut self, purchase: NewPurchase) -> Result<PurchaseRecord> {
        self.require_lock(EntityKey::Buyer(purchase.buyer_id))?;
        self.require_lock(EntityKey::Seller(purchase.seller_id))?;
        self.require_lock(EntityKey::Product(purchase.product_id))?;
        checks::purchase(&purchase)?;

        let record = purchase.with_id(PurchaseId::new(next(&self.store.sequences.purchases)));
        self.pending.purchases.push(record.clone());
        Ok(record)
    }

    fn commit(mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        {
            let mut tables = self.store.tables.write();
            tables.buyers.extend(pending.buyers);
            tables.sellers.extend(pending.sellers);
            tables.products.extend(pending.products);
            tables
                .purchases
                .extend(pending.purchases.into_iter().map(|r| (r.id, r)));
        }
        self.release();
        Ok(())
    }

    fn rollback(mut self) -> Result<()> {
        self.pending = Pending::default();
        self.release();
        Ok(())
    }
}

impl Drop for MemoryUnit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(unit = self.id, locks = self.held.len(), "Unit dropped without commit");
        }
        self.release();
    }
}
