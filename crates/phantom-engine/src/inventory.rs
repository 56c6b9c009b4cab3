//! Stock adjustment and batch catalog management.
//!
//! Both follow the purchase discipline: a lock-free pass to fail fast, then
//! locks in global order (seller before its products), then the rules again
//! against the locked rows. Product name uniqueness is decided under the
//! seller lock, so two batches for one seller cannot both claim a name.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use phantom_core::money::is_valid_price;
use phantom_core::{Deadline, NewProduct, Product, ProductDraft, ProductId, SellerId};
use phantom_store::{LedgerStore, UnitOfWork};
use serde::Serialize;

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::flow::{Flow, PurchasePhase};
use crate::lock::{self, LockPlan};
use crate::validate::insufficient_stock;

/// Largest catalog batch accepted.
pub const MAX_BATCH_ITEMS: usize = 100;

/// Outcome of a stock adjustment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAdjustment {
    /// Adjusted product.
    pub product_id: ProductId,
    /// Its name.
    pub product_name: String,
    /// Stock before.
    pub old_quantity: u32,
    /// Requested change.
    pub delta: i64,
    /// Stock after.
    pub new_quantity: u32,
    /// Caller-supplied note.
    pub reason: Option<String>,
    /// When the change was applied.
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a batch catalog change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogBatch {
    /// The seller whose catalog changed.
    pub seller_id: SellerId,
    /// Its name.
    pub seller_name: String,
    /// Products created, in request order.
    pub created: Vec<Product>,
    /// Products updated, in request order.
    pub updated: Vec<Product>,
}

fn stock_error(product: &Product, delta: i64) -> EngineError {
    if delta < 0 {
        insufficient_stock(product, delta.unsigned_abs())
    } else {
        EngineError::AmountOverflow(format!(
            "stock of product {} + {delta}",
            product.id
        ))
    }
}

/// Checks that need no store access.
fn check_drafts(drafts: &[ProductDraft]) -> Result<()> {
    if drafts.is_empty() || drafts.len() > MAX_BATCH_ITEMS {
        return Err(EngineError::InvalidBatchSize {
            count: drafts.len(),
            max: MAX_BATCH_ITEMS,
        });
    }
    if let Some(bad) = drafts.iter().find(|d| !is_valid_price(d.price)) {
        return Err(EngineError::InvalidPrice {
            name: bad.name.clone(),
            price: bad.price,
        });
    }

    let mut names = BTreeSet::new();
    let duplicates: BTreeSet<_> = drafts
        .iter()
        .filter(|d| !names.insert(d.name.as_str()))
        .map(|d| d.name.clone())
        .collect();
    if !duplicates.is_empty() {
        return Err(EngineError::DuplicateProductNames {
            names: duplicates.into_iter().collect(),
        });
    }

    let mut ids = BTreeSet::new();
    let repeated: BTreeSet<_> = drafts
        .iter()
        .filter_map(|d| d.product_id)
        .filter(|id| !ids.insert(*id))
        .collect();
    if !repeated.is_empty() {
        return Err(EngineError::DuplicateProductIds {
            ids: repeated.into_iter().collect(),
        });
    }
    Ok(())
}

/// Names in the batch already used by a product of the seller that the batch
/// does not itself edit.
fn taken_names<U: UnitOfWork>(
    unit: &U,
    seller_id: SellerId,
    drafts: &[ProductDraft],
) -> Result<Vec<String>> {
    let edited: BTreeSet<ProductId> = drafts.iter().filter_map(|d| d.product_id).collect();
    let mut taken = Vec::new();
    for draft in drafts {
        if let Some(existing) = unit.find_product_by_name(seller_id, &draft.name)? {
            if !edited.contains(&existing.id) {
                taken.push(draft.name.clone());
            }
        }
    }
    Ok(taken)
}

impl<S: LedgerStore> Engine<S> {
    /// Change a product's stock by `delta`.
    ///
    /// Uses the configured request deadline.
    ///
    /// # Errors
    ///
    /// See [`Engine::adjust_stock_until`].
    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: Option<String>,
    ) -> Result<StockAdjustment> {
        self.adjust_stock_until(product_id, delta, reason, self.config().deadline())
    }

    /// Change a product's stock by `delta`, giving up at `deadline`.
    ///
    /// A zero `delta` succeeds without writing.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ProductNotFound`] if the product does not exist.
    /// - [`EngineError::InsufficientStock`] if the result would be negative;
    ///   stock is left unchanged.
    /// - Transient conflict or internal errors as for purchases.
    pub fn adjust_stock_until(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: Option<String>,
        deadline: Deadline,
    ) -> Result<StockAdjustment> {
        let mut flow = Flow::start("adjust_stock", deadline);
        let result = self.in_unit(&mut flow, |unit, flow| {
            let seen = self
                .store()
                .get_product(product_id)?
                .ok_or(EngineError::ProductNotFound { product_id })?;
            if seen.apply_stock_delta(delta).is_none() {
                return Err(stock_error(&seen, delta));
            }

            flow.enter(PurchasePhase::Locking)?;
            let mut plan = LockPlan::default();
            plan.add(seen.seller_id);
            plan.add(product_id);
            let mut locked = lock::acquire(unit, &plan, flow, self.config().lock_timeout)?;

            flow.enter(PurchasePhase::Rechecking)?;
            let mut product = locked
                .products
                .remove(&product_id)
                .ok_or(EngineError::ProductNotFound { product_id })?;
            let old_quantity = product.stock_quantity;
            let new_quantity = product
                .apply_stock_delta(delta)
                .ok_or_else(|| stock_error(&product, delta))?;

            flow.enter(PurchasePhase::Committing)?;
            if delta != 0 {
                product.stock_quantity = new_quantity;
                unit.update_product(&product)?;
            }
            Ok(StockAdjustment {
                product_id,
                product_name: product.name,
                old_quantity,
                delta,
                new_quantity,
                reason,
                updated_at: Utc::now(),
            })
        });
        let adjustment = flow.finish(result)?;

        tracing::info!(
            product_id = %adjustment.product_id,
            old = adjustment.old_quantity,
            new = adjustment.new_quantity,
            reason = adjustment.reason.as_deref().unwrap_or(""),
            "Stock adjusted"
        );
        Ok(adjustment)
    }

    /// Create and update a seller's products in one unit of work.
    ///
    /// Uses the configured request deadline.
    ///
    /// # Errors
    ///
    /// See [`Engine::upsert_products_until`].
    pub fn upsert_products(
        &self,
        seller_id: SellerId,
        drafts: &[ProductDraft],
    ) -> Result<CatalogBatch> {
        self.upsert_products_until(seller_id, drafts, self.config().deadline())
    }

    /// Create and update a seller's products, giving up at `deadline`.
    ///
    /// A draft with `product_id` updates that product; one without creates a
    /// product. Every change commits together or not at all.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidBatchSize`], [`EngineError::InvalidPrice`],
    ///   [`EngineError::DuplicateProductNames`], or
    ///   [`EngineError::DuplicateProductIds`] for a malformed request.
    /// - [`EngineError::SellerNotFound`] or
    ///   [`EngineError::ProductNotFoundForSeller`].
    /// - [`EngineError::ProductNameTaken`] if a name collides with a product
    ///   of the seller that the batch does not edit.
    /// - Transient conflict or internal errors as for purchases.
    pub fn upsert_products_until(
        &self,
        seller_id: SellerId,
        drafts: &[ProductDraft],
        deadline: Deadline,
    ) -> Result<CatalogBatch> {
        let mut flow = Flow::start("upsert_products", deadline);
        let result = check_drafts(drafts).and_then(|()| {
            self.in_unit(&mut flow, |unit, flow| {
                self.upsert_in_unit(unit, flow, seller_id, drafts)
            })
        });
        let batch = flow.finish(result)?;

        tracing::info!(
            seller_id = %batch.seller_id,
            created = batch.created.len(),
            updated = batch.updated.len(),
            "Catalog batch committed"
        );
        Ok(batch)
    }

    fn upsert_in_unit<U: UnitOfWork>(
        &self,
        unit: &mut U,
        flow: &mut Flow,
        seller_id: SellerId,
        drafts: &[ProductDraft],
    ) -> Result<CatalogBatch> {
        unit.find_seller(seller_id)?
            .ok_or(EngineError::SellerNotFound { seller_id })?;
        for product_id in drafts.iter().filter_map(|d| d.product_id) {
            unit.find_product(product_id, seller_id)?
                .ok_or(EngineError::ProductNotFoundForSeller {
                    product_id,
                    seller_id,
                })?;
        }

        flow.enter(PurchasePhase::Locking)?;
        let mut plan = LockPlan::default();
        plan.add(seller_id);
        for product_id in drafts.iter().filter_map(|d| d.product_id) {
            plan.add(product_id);
        }
        let mut locked = lock::acquire(unit, &plan, flow, self.config().lock_timeout)?;

        flow.enter(PurchasePhase::Rechecking)?;
        let seller = locked
            .sellers
            .remove(&seller_id)
            .ok_or(EngineError::SellerNotFound { seller_id })?;
        let mut edits: BTreeMap<ProductId, Product> = BTreeMap::new();
        for product_id in drafts.iter().filter_map(|d| d.product_id) {
            let product = locked
                .products
                .remove(&product_id)
                .filter(|p| p.belongs_to(seller_id))
                .ok_or(EngineError::ProductNotFoundForSeller {
                    product_id,
                    seller_id,
                })?;
            edits.insert(product_id, product);
        }
        let taken = taken_names(unit, seller_id, drafts)?;
        if !taken.is_empty() {
            return Err(EngineError::ProductNameTaken {
                seller_id,
                names: taken,
            });
        }

        flow.enter(PurchasePhase::Committing)?;
        // Renames are parked under unique placeholder names first, so that
        // products in the batch can swap names without a transient collision.
        for product in edits.values() {
            let draft_name = drafts
                .iter()
                .find(|d| d.product_id == Some(product.id))
                .map(|d| d.name.as_str());
            if draft_name.is_some_and(|name| name != product.name) {
                let mut parked = product.clone();
                parked.name = format!("\u{0}renaming:{}", product.id);
                unit.update_product(&parked)?;
            }
        }

        let now = Utc::now();
        let mut created = Vec::new();
        let mut updated = Vec::new();
        for draft in drafts {
            match draft.product_id {
                Some(product_id) => {
                    let mut product = edits.remove(&product_id).ok_or_else(|| {
                        EngineError::Internal(format!("product {product_id} not locked"))
                    })?;
                    product.name.clone_from(&draft.name);
                    product.price = draft.price;
                    product.stock_quantity = draft.stock_quantity;
                    product.updated_at = now;
                    unit.update_product(&product)?;
                    updated.push(product);
                }
                None => {
                    created.push(unit.insert_product(NewProduct {
                        seller_id,
                        name: draft.name.clone(),
                        price: draft.price,
                        stock_quantity: draft.stock_quantity,
                    })?);
                }
            }
        }

        Ok(CatalogBatch {
            seller_id,
            seller_name: seller.name,
            created,
            updated,
        })
    }
}
