//! The engine handle and its committed reads.

use phantom_core::{
    Buyer, BuyerId, Product, ProductId, PurchaseFilter, PurchaseId, PurchaseRecord, Seller,
    SellerId,
};
use phantom_store::LedgerStore;

use crate::classify;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::flow::Flow;

/// The transactional consistency engine.
///
/// Cheap to share behind an `Arc`. Every operation runs in its own unit of
/// work on the calling thread and blocks while waiting for row locks.
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: LedgerStore> Engine<S> {
    /// Create an engine over `store`.
    #[must_use]
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// The backing store, for the loading path.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration this engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `body` in a fresh unit of work, then commit or roll back.
    ///
    /// `body` must leave `flow` in the committing phase on success. Any error
    /// rolls the unit back before it is returned.
    pub(crate) fn in_unit<'s, T, F>(&'s self, flow: &mut Flow, body: F) -> Result<T>
    where
        F: FnOnce(&mut S::Unit<'s>, &mut Flow) -> Result<T>,
    {
        let mut unit = self.store.begin(flow.lock_wait(self.config.lock_timeout))?;
        match body(&mut unit, flow) {
            Ok(value) => {
                classify::commit(unit)?;
                Ok(value)
            }
            Err(err) => {
                classify::abandon(unit, &err);
                Err(err)
            }
        }
    }

    // =========================================================================
    // Committed reads
    // =========================================================================

    /// Get a buyer.
    ///
    /// # Errors
    ///
    /// [`EngineError::BuyerNotFound`] if absent.
    pub fn buyer(&self, buyer_id: BuyerId) -> Result<Buyer> {
        self.store
            .get_buyer(buyer_id)?
            .ok_or(EngineError::BuyerNotFound { buyer_id })
    }

    /// Get a seller.
    ///
    /// # Errors
    ///
    /// [`EngineError::SellerNotFound`] if absent.
    pub fn seller(&self, seller_id: SellerId) -> Result<Seller> {
        self.store
            .get_seller(seller_id)?
            .ok_or(EngineError::SellerNotFound { seller_id })
    }

    /// Get a product.
    ///
    /// # Errors
    ///
    /// [`EngineError::ProductNotFound`] if absent.
    pub fn product(&self, product_id: ProductId) -> Result<Product> {
        self.store
            .get_product(product_id)?
            .ok_or(EngineError::ProductNotFound { product_id })
    }

    /// A seller's products in ID order.
    ///
    /// # Errors
    ///
    /// [`EngineError::SellerNotFound`] if the seller is absent.
    pub fn products(&self, seller_id: SellerId) -> Result<Vec<Product>> {
        self.seller(seller_id)?;
        Ok(self.store.list_products(seller_id)?)
    }

    /// Get a purchase record.
    ///
    /// # Errors
    ///
    /// [`EngineError::PurchaseNotFound`] if absent.
    pub fn purchase(&self, purchase_id: PurchaseId) -> Result<PurchaseRecord> {
        self.store
            .get_purchase(purchase_id)?
            .ok_or(EngineError::PurchaseNotFound { purchase_id })
    }

    /// Purchase history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn purchases(&self, filter: &PurchaseFilter) -> Result<Vec<PurchaseRecord>> {
        Ok(self.store.list_purchases(filter)?)
    }
}
