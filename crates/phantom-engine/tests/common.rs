//! Shared test utilities for engine integration tests.

#![allow(dead_code)]

use std::time::Duration;

use phantom_core::{
    Buyer, BuyerId, Decimal, EntityKey, EntitySnapshot, NewBuyer, NewProduct, NewPurchase,
    NewSeller, Product, ProductId, PurchaseFilter, PurchaseId, PurchaseRecord, Seller, SellerId,
};
use phantom_engine::{Engine, EngineConfig};
use phantom_store::{LedgerStore, MemoryStore, Result, StoreError, UnitOfWork};

/// Parse a decimal literal.
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Engine over an empty in-memory store with a generous lock wait.
pub fn engine() -> Engine<MemoryStore> {
    Engine::new(
        MemoryStore::new(),
        EngineConfig {
            lock_timeout: Duration::from_secs(5),
            request_deadline: Some(Duration::from_secs(30)),
        },
    )
}

pub fn buyer<S: LedgerStore>(store: &S, balance: &str) -> Buyer {
    store.insert_buyer(NewBuyer::new("Ann", dec(balance))).unwrap()
}

pub fn seller<S: LedgerStore>(store: &S, name: &str, balance: &str) -> Seller {
    store.insert_seller(NewSeller::new(name, dec(balance))).unwrap()
}

pub fn product<S: LedgerStore>(
    store: &S,
    seller_id: SellerId,
    name: &str,
    price: &str,
    stock: u32,
) -> Product {
    store
        .insert_product(NewProduct {
            seller_id,
            name: name.into(),
            price: dec(price),
            stock_quantity: stock,
        })
        .unwrap()
}

pub fn balance_of_buyer<S: LedgerStore>(engine: &Engine<S>, id: BuyerId) -> Decimal {
    engine.buyer(id).unwrap().cash_balance
}

pub fn balance_of_seller<S: LedgerStore>(engine: &Engine<S>, id: SellerId) -> Decimal {
    engine.seller(id).unwrap().cash_balance
}

pub fn stock_of<S: LedgerStore>(engine: &Engine<S>, id: ProductId) -> u32 {
    engine.product(id).unwrap().stock_quantity
}

pub fn record_count<S: LedgerStore>(engine: &Engine<S>) -> usize {
    engine
        .purchases(&PurchaseFilter::all(usize::MAX))
        .unwrap()
        .len()
}

// =============================================================================
// Fault injection
// =============================================================================

/// Store wrapper whose units fail at commit with a chosen error.
pub struct FaultyStore<S> {
    pub inner: S,
    pub commit_error: Option<StoreError>,
}

impl<S> FaultyStore<S> {
    pub fn failing(inner: S, err: StoreError) -> Self {
        Self {
            inner,
            commit_error: Some(err),
        }
    }
}

pub struct FaultyUnit<U> {
    inner: U,
    commit_error: Option<StoreError>,
}

impl<S: LedgerStore> LedgerStore for FaultyStore<S> {
    type Unit<'a> = FaultyUnit<S::Unit<'a>> where Self: 'a;

    fn begin(&self, lock_timeout: Duration) -> Result<Self::Unit<'_>> {
        Ok(FaultyUnit {
            inner: self.inner.begin(lock_timeout)?,
            commit_error: self.commit_error.clone(),
        })
    }

    fn insert_buyer(&self, buyer: NewBuyer) -> Result<Buyer> {
        self.inner.insert_buyer(buyer)
    }

    fn insert_seller(&self, seller: NewSeller) -> Result<Seller> {
        self.inner.insert_seller(seller)
    }

    fn insert_product(&self, product: NewProduct) -> Result<Product> {
        self.inner.insert_product(product)
    }

    fn get_buyer(&self, id: BuyerId) -> Result<Option<Buyer>> {
        self.inner.get_buyer(id)
    }

    fn get_seller(&self, id: SellerId) -> Result<Option<Seller>> {
        self.inner.get_seller(id)
    }

    fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        self.inner.get_product(id)
    }

    fn get_purchase(&self, id: PurchaseId) -> Result<Option<PurchaseRecord>> {
        self.inner.get_purchase(id)
    }

    fn list_products(&self, seller_id: SellerId) -> Result<Vec<Product>> {
        self.inner.list_products(seller_id)
    }

    fn list_purchases(&self, filter: &PurchaseFilter) -> Result<Vec<PurchaseRecord>> {
        self.inner.list_purchases(filter)
    }
}

impl<U: UnitOfWork> UnitOfWork for FaultyUnit<U> {
    fn find_buyer(&self, id: BuyerId) -> Result<Option<Buyer>> {
        self.inner.find_buyer(id)
    }

    fn find_seller(&self, id: SellerId) -> Result<Option<Seller>> {
        self.inner.find_seller(id)
    }

    fn find_product(&self, id: ProductId, seller_id: SellerId) -> Result<Option<Product>> {
        self.inner.find_product(id, seller_id)
    }

    fn find_product_by_name(&self, seller_id: SellerId, name: &str) -> Result<Option<Product>> {
        self.inner.find_product_by_name(seller_id, name)
    }

    fn lock_for_update(&mut self, key: EntityKey) -> Result<Option<EntitySnapshot>> {
        self.inner.lock_for_update(key)
    }

    fn set_lock_wait(&mut self, wait: Duration) {
        self.inner.set_lock_wait(wait);
    }

    fn update_buyer(&mut self, buyer: &Buyer) -> Result<()> {
        self.inner.update_buyer(buyer)
    }

    fn update_seller(&mut self, seller: &Seller) -> Result<()> {
        self.inner.update_seller(seller)
    }

    fn update_product(&mut self, product: &Product) -> Result<()> {
        self.inner.update_product(product)
    }

    fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        self.inner.insert_product(product)
    }

    fn insert_purchase(&mut self, purchase: NewPurchase) -> Result<PurchaseRecord> {
        self.inner.insert_purchase(purchase)
    }

    fn commit(self) -> Result<()> {
        match self.commit_error {
            Some(err) => {
                self.inner.rollback()?;
                Err(err)
            }
            None => self.inner.commit(),
        }
    }

    fn rollback(self) -> Result<()> {
        self.inner.rollback()
    }
}
