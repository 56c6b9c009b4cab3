//! `RocksDB` storage implementation.
//!
//! Backed by a pessimistic `TransactionDB`: every unit of work is one RocksDB
//! transaction, row locks are `get_for_update` point locks, and lock waits use
//! RocksDB's own timeout and deadlock detection.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, MultiThreaded, Options,
    Transaction, TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};

use phantom_core::{
    Buyer, BuyerId, EntityKey, EntitySnapshot, NewBuyer, NewProduct, NewPurchase, NewSeller,
    Product, ProductId, PurchaseFilter, PurchaseId, PurchaseRecord, Seller, SellerId,
};

use crate::checks;
use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{LedgerStore, UnitOfWork, LOADING_LOCK_TIMEOUT};

type Db = TransactionDB<MultiThreaded>;

/// Map an error raised while waiting for a row lock.
fn lock_error(err: &rocksdb::Error, key: EntityKey) -> StoreError {
    match err.kind() {
        ErrorKind::TimedOut => StoreError::LockTimeout { key },
        ErrorKind::Busy if err.to_string().contains("Deadlock") => StoreError::Deadlock { key },
        ErrorKind::Busy | ErrorKind::TryAgain => StoreError::Busy(err.to_string()),
        _ => StoreError::Database(err.to_string()),
    }
}

/// Map any other RocksDB error.
fn db_error(err: &rocksdb::Error) -> StoreError {
    match err.kind() {
        ErrorKind::Busy | ErrorKind::TryAgain | ErrorKind::TimedOut => {
            StoreError::Busy(err.to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

/// Largest primary key in a column family, or 0 when empty.
fn last_id(db: &Db, name: &str) -> Result<u64> {
    let cf = db
        .cf_handle(name)
        .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))?;
    let Some(item) = db.iterator_cf(&cf, IteratorMode::End).next() else {
        return Ok(0);
    };
    let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
    keys::decode_id(&key).ok_or_else(|| StoreError::Database(format!("malformed key in {name}")))
}

#[derive(Debug)]
struct Sequences {
    buyers: AtomicU64,
    sellers: AtomicU64,
    products: AtomicU64,
    purchases: AtomicU64,
}

/// RocksDB-backed ledger store.
pub struct RocksStore {
    db: Arc<Db>,
    sequences: Sequences,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// ID sequences resume after the largest ID already on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(
            &opts,
            &TransactionDBOptions::default(),
            path,
            cf_descriptors,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let sequences = Sequences {
            buyers: AtomicU64::new(last_id(&db, cf::BUYERS)? + 1),
            sellers: AtomicU64::new(last_id(&db, cf::SELLERS)? + 1),
            products: AtomicU64::new(last_id(&db, cf::PRODUCTS)? + 1),
            purchases: AtomicU64::new(last_id(&db, cf::PURCHASES)? + 1),
        };
        tracing::debug!(?sequences, "Opened ledger database");

        Ok(Self {
            db: Arc::new(db),
            sequences,
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get<T: serde::de::DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Trailing IDs of the index entries under `prefix`, in ascending order.
    fn index_ids(&self, name: &str, prefix: &[u8]) -> Result<Vec<u64>> {
        let cf = self.cf(name)?;
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(prefix, rocksdb::Direction::Forward),
        );

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(id) = keys::index_suffix(&key) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn put_new<T: serde::Serialize>(&self, name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(name)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl LedgerStore for RocksStore {
    type Unit<'a> = RocksUnit<'a>;

    fn begin(&self, lock_timeout: Duration) -> Result<RocksUnit<'_>> {
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_lock_timeout(i64::try_from(lock_timeout.as_millis()).unwrap_or(i64::MAX));
        txn_opts.set_deadlock_detect(true);

        Ok(RocksUnit {
            store: self,
            txn: self.db.transaction_opt(&WriteOptions::default(), &txn_opts),
            held: BTreeSet::new(),
        })
    }

    // =========================================================================
    // Loading path
    // =========================================================================

    fn insert_buyer(&self, buyer: NewBuyer) -> Result<Buyer> {
        let now = Utc::now();
        let row = Buyer {
            id: BuyerId::new(self.sequences.buyers.fetch_add(1, Ordering::Relaxed)),
            name: buyer.name,
            cash_balance: buyer.cash_balance,
            created_at: now,
            updated_at: now,
        };
        checks::buyer(&row)?;
        self.put_new(cf::BUYERS, &keys::buyer_key(row.id), &row)?;
        Ok(row)
    }

    fn insert_seller(&self, seller: NewSeller) -> Result<Seller> {
        let now = Utc::now();
        let row = Seller {
            id: SellerId::new(self.sequences.sellers.fetch_add(1, Ordering::Relaxed)),
            name: seller.name,
            cash_balance: seller.cash_balance,
            opening_hours: seller.opening_hours,
            created_at: now,
            updated_at: now,
        };
        checks::seller(&row)?;
        self.put_new(cf::SELLERS, &keys::seller_key(row.id), &row)?;
        Ok(row)
    }

    fn insert_product(&self, product: NewProduct) -> Result<Product> {
        // The name check must run under the seller lock, same as catalog edits.
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
        self.get(cf::BUYERS, &keys::buyer_key(id))
    }

    fn get_seller(&self, id: SellerId) -> Result<Option<Seller>> {
        self.get(cf::SELLERS, &keys::seller_key(id))
    }

    fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        self.get(cf::PRODUCTS, &keys::product_key(id))
    }

    fn get_purchase(&self, id: PurchaseId) -> Result<Option<PurchaseRecord>> {
        self.get(cf::PURCHASES, &keys::purchase_key(id))
    }

    fn list_products(&self, seller_id: SellerId) -> Result<Vec<Product>> {
        let ids = self.index_ids(cf::PRODUCTS_BY_SELLER, &keys::owner_prefix(seller_id.get()))?;
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(product) = self.get_product(ProductId::new(id))? {
                products.push(product);
            }
        }
        Ok(products)
    }

    fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<PurchaseRecord>> {
        let mut records = Vec::new();
        if filter.limit == 0 {
            return Ok(records);
        }

        let mut skipped = 0;
        let mut visit = |record: PurchaseRecord| {
            if !filter.matches(&record) {
                return true;
            }
            if skipped < filter.offset {
                skipped += 1;
                return true;
            }
            records.push(record);
            records.len() < filter.limit
        };

        if let Some(buyer_id) = filter.buyer_id {
            // Index order is purchase order, so reverse for newest first.
            let mut ids =
                self.index_ids(cf::PURCHASES_BY_BUYER, &keys::owner_prefix(buyer_id.get()))?;
            ids.reverse();
            for id in ids {
                if let Some(record) = self.get_purchase(PurchaseId::new(id))? {
                    if !visit(record) {
                        break;
                    }
                }
            }
        } else {
            let cf = self.cf(cf::PURCHASES)?;
            for item in self.db.iterator_cf(&cf, IteratorMode::End) {
                let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                if !visit(Self::deserialize(&value)?) {
                    break;
                }
            }
        }

        Ok(records)
    }
}

/// A unit of work backed by one RocksDB transaction.
///
/// Dropping the unit drops the transaction, which rolls it back.
pub struct RocksUnit<'a> {
    store: &'a RocksStore,
    txn: Transaction<'a, Db>,
    held: BTreeSet<EntityKey>,
}

impl RocksUnit<'_> {
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

    fn locate(key: EntityKey) -> (&'static str, Vec<u8>) {
        match key {
            EntityKey::Buyer(id) => (cf::BUYERS, keys::buyer_key(id)),
            EntityKey::Seller(id) => (cf::SELLERS, keys::seller_key(id)),
            EntityKey::Product(id) => (cf::PRODUCTS, keys::product_key(id)),
        }
    }

    fn decode(key: EntityKey, data: &[u8]) -> Result<EntitySnapshot> {
        Ok(match key {
            EntityKey::Buyer(_) => EntitySnapshot::Buyer(RocksStore::deserialize(data)?),
            EntityKey::Seller(_) => EntitySnapshot::Seller(RocksStore::deserialize(data)?),
            EntityKey::Product(_) => EntitySnapshot::Product(RocksStore::deserialize(data)?),
        })
    }

    fn read<T: serde::de::DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.store.cf(name)?;
        self.txn
            .get_cf(&cf, key)
            .map_err(|e| db_error(&e))?
            .map(|data| RocksStore::deserialize(&data))
            .transpose()
    }

    fn write<T: serde::Serialize>(&self, name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.store.cf(name)?;
        let value = RocksStore::serialize(value)?;
        self.txn.put_cf(&cf, key, value).map_err(|e| db_error(&e))
    }

    fn index(&self, name: &str, key: &[u8]) -> Result<()> {
        let cf = self.store.cf(name)?;
        self.txn.put_cf(&cf, key, []).map_err(|e| db_error(&e))
    }

    /// The seller's products as this transaction sees them.
    fn seller_products(&self, seller_id: SellerId) -> Result<Vec<Product>> {
        let cf = self.store.cf(cf::PRODUCTS_BY_SELLER)?;
        let prefix = keys::owner_prefix(seller_id.get());
        let iter = self.txn.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut products = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| db_error(&e))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let Some(id) = keys::index_suffix(&key) else {
                continue;
            };
            let row_key = keys::product_key(ProductId::new(id));
            if let Some(product) = self.read(cf::PRODUCTS, &row_key)? {
                products.push(product);
            }
        }
        Ok(products)
    }

    fn ensure_name_free(
        &self,
        seller_id: SellerId,
        name: &str,
        except: Option<ProductId>,
    ) -> Result<()> {
        let taken = self
            .seller_products(seller_id)?
            .iter()
            .any(|p| p.name == name && Some(p.id) != except);
        if taken {
            return Err(StoreError::Constraint(format!(
                "seller {seller_id} already lists {name:?}"
            )));
        }
        Ok(())
    }
}

impl UnitOfWork for RocksUnit<'_> {
    fn find_buyer(&self, id: BuyerId) -> Result<Option<Buyer>> {
        self.read(cf::BUYERS, &keys::buyer_key(id))
    }

    fn find_seller(&self, id: SellerId) -> Result<Option<Seller>> {
        self.read(cf::SELLERS, &keys::seller_key(id))
    }

    fn find_product(&self, id: ProductId, seller_id: SellerId) -> Result<Option<Product>> {
        Ok(self
            .read::<Product>(cf::PRODUCTS, &keys::product_key(id))?
            .filter(|p| p.belongs_to(seller_id)))
    }

    fn find_product_by_name(&self, seller_id: SellerId, name: &str) -> Result<Option<Product>> {
        Ok(self
            .seller_products(seller_id)?
            .into_iter()
            .find(|p| p.name == name))
    }

    fn lock_for_update(&mut self, key: EntityKey) -> Result<Option<EntitySnapshot>> {
        let (name, raw) = Self::locate(key);
        let cf = self.store.cf(name)?;
        let data = self
            .txn
            .get_for_update_cf(&cf, raw, true)
            .map_err(|e| lock_error(&e, key))?;

        // RocksDB keeps the point lock on a missing key until the transaction
        // ends; it is simply not counted as held.
        let Some(data) = data else {
            return Ok(None);
        };
        self.held.insert(key);
        Self::decode(key, &data).map(Some)
    }

    // The wait is a transaction option set in `begin`.
    fn set_lock_wait(&mut self, _wait: Duration) {}

    fn update_buyer(&mut self, buyer: &Buyer) -> Result<()> {
        self.require_lock(EntityKey::Buyer(buyer.id))?;
        checks::buyer(buyer)?;
        let mut row = buyer.clone();
        row.updated_at = Utc::now();
        self.write(cf::BUYERS, &keys::buyer_key(row.id), &row)
    }

    fn update_seller(&mut self, seller: &Seller) -> Result<()> {
        self.require_lock(EntityKey::Seller(seller.id))?;
        checks::seller(seller)?;
        let mut row = seller.clone();
        row.updated_at = Utc::now();
        self.write(cf::SELLERS, &keys::seller_key(row.id), &row)
    }

    fn update_product(&mut self, product: &Product) -> Result<()> {
        let key = EntityKey::Product(product.id);
        self.require_lock(key)?;
        checks::product(product)?;

        let current: Product = self
            .read(cf::PRODUCTS, &keys::product_key(product.id))?
            .ok_or(StoreError::NotFound { key })?;
        if current.seller_id != product.seller_id {
            return Err(StoreError::Constraint(format!(
                "product {} cannot move from seller {} to {}",
                product.id, current.seller_id, product.seller_id
            )));
        }
        self.ensure_name_free(product.seller_id, &product.name, Some(product.id))?;

        let mut row = product.clone();
        row.updated_at = Utc::now();
        self.write(cf::PRODUCTS, &keys::product_key(row.id), &row)
    }

    fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        self.require_lock(EntityKey::Seller(product.seller_id))?;
        checks::price(&product.name, product.price)?;
        self.ensure_name_free(product.seller_id, &product.name, None)?;

        let now = Utc::now();
        let row = Product {
            id: ProductId::new(self.store.sequences.products.fetch_add(1, Ordering::Relaxed)),
            seller_id: product.seller_id,
            name: product.name,
            price: product.price,
            stock_quantity: product.stock_quantity,
            created_at: now,
            updated_at: now,
        };

        let key = EntityKey::Product(row.id);
        let cf = self.store.cf(cf::PRODUCTS)?;
        self.txn
            .get_for_update_cf(&cf, keys::product_key(row.id), true)
            .map_err(|e| lock_error(&e, key))?;
        self.held.insert(key);

        self.write(cf::PRODUCTS, &keys::product_key(row.id), &row)?;
        self.index(
            cf::PRODUCTS_BY_SELLER,
            &keys::seller_product_key(row.seller_id, row.id),
        )?;
        Ok(row)
    }

    fn insert_purchase(&mut self, purchase: NewPurchase) -> Result<PurchaseRecord> {
        self.require_lock(EntityKey::Buyer(purchase.buyer_id))?;
        self.require_lock(EntityKey::Seller(purchase.seller_id))?;
        self.require_lock(EntityKey::Product(purchase.product_id))?;
        checks::purchase(&purchase)?;

        let id = PurchaseId::new(self.store.sequences.purchases.fetch_add(1, Ordering::Relaxed));
        let record = purchase.with_id(id);
        self.write(cf::PURCHASES, &keys::purchase_key(id), &record)?;
        self.index(
            cf::PURCHASES_BY_BUYER,
            &keys::buyer_purchase_key(record.buyer_id, id),
        )?;
        Ok(record)
    }

    fn commit(self) -> Result<()> {
        self.txn.commit().map_err(|e| db_error(&e))
    }

    fn rollback(self) -> Result<()> {
        self.txn.rollback().map_err(|e| db_error(&e))
    }
}

#[cfg(test)]
mod tests {
    use phantom_core::Decimal;
    use tempfile::TempDir;

    use super::*;

    const WAIT: Duration = Duration::from_millis(100);

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn seed(store: &RocksStore) -> (Buyer, Seller, Product) {
        let buyer = store
            .insert_buyer(NewBuyer::new("Ann", Decimal::from(100)))
            .unwrap();
        let seller = store
            .insert_seller(NewSeller::new("Corner Pharmacy", Decimal::from(50)))
            .unwrap();
        let product = store
            .insert_product(NewProduct {
                seller_id: seller.id,
                name: "Second Smile (blue) (6 per pack)".into(),
                price: Decimal::new(500, 2),
                stock_quantity: 10,
            })
            .unwrap();
        (buyer, seller, product)
    }

    fn buy(store: &RocksStore, buyer: &Buyer, product: &Product, quantity: u32) -> PurchaseRecord {
        let mut unit = store.begin(WAIT).unwrap();
        unit.lock_for_update(EntityKey::Buyer(buyer.id)).unwrap();
        unit.lock_for_update(EntityKey::Seller(product.seller_id))
            .unwrap();
        unit.lock_for_update(EntityKey::Product(product.id))
            .unwrap();
        let record = unit
            .insert_purchase(NewPurchase {
                buyer_id: buyer.id,
                seller_id: product.seller_id,
                product_id: product.id,
                quantity,
                unit_price: product.price,
                total_amount: product.price * Decimal::from(quantity),
                purchased_at: Utc::now(),
            })
            .unwrap();
        unit.commit().unwrap();
        record
    }

    #[test]
    fn commit_applies_and_rollback_discards() {
        let (store, _dir) = create_test_store();
        let (buyer, _, _) = seed(&store);

        let mut unit = store.begin(WAIT).unwrap();
        let mut row = unit
            .lock_for_update(EntityKey::Buyer(buyer.id))
            .unwrap()
            .and_then(EntitySnapshot::into_buyer)
            .unwrap();
        row.cash_balance = Decimal::from(40);
        unit.update_buyer(&row).unwrap();
        unit.rollback().unwrap();
        assert_eq!(
            store.get_buyer(buyer.id).unwrap().unwrap().cash_balance,
            Decimal::from(100)
        );

        let mut unit = store.begin(WAIT).unwrap();
        unit.lock_for_update(EntityKey::Buyer(buyer.id)).unwrap();
        unit.update_buyer(&row).unwrap();
        unit.commit().unwrap();
        assert_eq!(
            store.get_buyer(buyer.id).unwrap().unwrap().cash_balance,
            Decimal::from(40)
        );
    }

    #[test]
    fn second_locker_times_out() {
        let (store, _dir) = create_test_store();
        let (_, _, product) = seed(&store);
        let key = EntityKey::Product(product.id);

        let mut first = store.begin(WAIT).unwrap();
        first.lock_for_update(key).unwrap();

        let mut second = store.begin(Duration::from_millis(10)).unwrap();
        let err = second.lock_for_update(key).unwrap_err();
        assert!(err.is_contention(), "{err:?}");
    }

    #[test]
    fn write_requires_lock() {
        let (store, _dir) = create_test_store();
        let (_, _, product) = seed(&store);
        let mut unit = store.begin(WAIT).unwrap();
        assert!(matches!(
            unit.update_product(&product),
            Err(StoreError::NotLocked { .. })
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let (store, _dir) = create_test_store();
        let (_, seller, product) = seed(&store);
        let result = store.insert_product(NewProduct {
            seller_id: seller.id,
            name: product.name.clone(),
            price: Decimal::ONE,
            stock_quantity: 1,
        });
        assert!(matches!(result, Err(StoreError::Constraint(_))));
        assert_eq!(store.list_products(seller.id).unwrap().len(), 1);
    }

    #[test]
    fn purchases_newest_first() {
        let (store, _dir) = create_test_store();
        let (buyer, _, product) = seed(&store);
        for quantity in 1..=3 {
            buy(&store, &buyer, &product, quantity);
        }

        let by_buyer = store
            .list_purchases(&PurchaseFilter::for_buyer(buyer.id, 2))
            .unwrap();
        let quantities: Vec<_> = by_buyer.iter().map(|r| r.quantity).collect();
        assert_eq!(quantities, vec![3, 2]);

        let all = store
            .list_purchases(&PurchaseFilter {
                offset: 2,
                ..PurchaseFilter::all(10)
            })
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].quantity, 1);
    }

    #[test]
    fn reopen_keeps_data_and_sequences() {
        let dir = TempDir::new().unwrap();
        let first_id = {
            let store = RocksStore::open(dir.path()).unwrap();
            let (buyer, _, product) = seed(&store);
            buy(&store, &buyer, &product, 1).id
        };

        let store = RocksStore::open(dir.path()).unwrap();
        assert!(store.get_purchase(first_id).unwrap().is_some());

        let buyer = store.get_buyer(BuyerId::new(1)).unwrap().unwrap();
        let product = store.get_product(ProductId::new(1)).unwrap().unwrap();
        let next = buy(&store, &buyer, &product, 2);
        assert!(next.id > first_id);
    }
}
