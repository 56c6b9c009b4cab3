//! Lock-and-recheck stage.
//!
//! Every row an operation will write is locked up front, in the global order
//! of [`EntityKey`]. Locks are never taken one at a time from scattered call
//! sites: callers build a [`LockPlan`] and hand it to [`acquire`]. Once the
//! rows are held, [`recheck`] runs the validation rules again against the
//! locked values, which are the only values the commit stage may use.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use phantom_core::money::checked_sum;
use phantom_core::{
    Buyer, BuyerId, Decimal, EntityKey, EntitySnapshot, Product, ProductId, PurchaseLine, Seller,
    SellerId,
};
use phantom_store::UnitOfWork;

use crate::error::{EngineError, Result};
use crate::flow::Flow;
use crate::validate::{check_quantity, insufficient_stock, total_for};

/// The set of rows to lock, iterated in global lock order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LockPlan {
    keys: BTreeSet<EntityKey>,
}

impl LockPlan {
    /// Buyer, every referenced seller, and every referenced product, once each.
    pub(crate) fn for_purchase(buyer_id: BuyerId, lines: &[PurchaseLine]) -> Self {
        let mut plan = Self::default();
        plan.add(EntityKey::Buyer(buyer_id));
        for line in lines {
            plan.add(EntityKey::Seller(line.seller_id));
            plan.add(EntityKey::Product(line.product_id));
        }
        plan
    }

    pub(crate) fn add(&mut self, key: impl Into<EntityKey>) {
        self.keys.insert(key.into());
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.keys.iter().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Rows held by a unit of work, as read under their locks.
///
/// Rows that turned out not to exist are absent.
#[derive(Debug, Default)]
pub(crate) struct Locked {
    pub(crate) buyers: BTreeMap<BuyerId, Buyer>,
    pub(crate) sellers: BTreeMap<SellerId, Seller>,
    pub(crate) products: BTreeMap<ProductId, Product>,
}

/// Lock every row in `plan`, in order.
///
/// Each wait is `lock_timeout` cut short by whatever is left of the flow's
/// deadline, so time spent on earlier rows counts against later ones.
///
/// # Errors
///
/// - [`EngineError::DeadlineExceeded`] if the deadline passes between rows.
/// - Store errors pass through the classifier: lock timeouts and deadlocks
///   become [`EngineError::TransientConflict`].
pub(crate) fn acquire<U: UnitOfWork>(
    unit: &mut U,
    plan: &LockPlan,
    flow: &Flow,
    lock_timeout: Duration,
) -> Result<Locked> {
    let mut locked = Locked::default();
    for key in plan.keys() {
        flow.check_deadline()?;
        unit.set_lock_wait(flow.lock_wait(lock_timeout));
        match unit.lock_for_update(key)? {
            Some(EntitySnapshot::Buyer(row)) => {
                locked.buyers.insert(row.id, row);
            }
            Some(EntitySnapshot::Seller(row)) => {
                locked.sellers.insert(row.id, row);
            }
            Some(EntitySnapshot::Product(row)) => {
                locked.products.insert(row.id, row);
            }
            None => tracing::debug!(%key, "Locked row does not exist"),
        }
    }
    tracing::debug!(rows = plan.len(), "Locks acquired");
    Ok(locked)
}

/// One purchase line checked against locked rows.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CheckedLine {
    pub(crate) line: PurchaseLine,
    pub(crate) unit_price: Decimal,
    pub(crate) total_amount: Decimal,
}

/// A purchase that passed the recheck.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CheckedPurchase {
    pub(crate) buyer_id: BuyerId,
    pub(crate) lines: Vec<CheckedLine>,
    pub(crate) total_amount: Decimal,
}

/// Re-run the validation rules against locked rows.
///
/// Stock is checked against the combined demand of every line naming the
/// product, and the balance against the sum of all lines. The price used is
/// the one read under lock.
pub(crate) fn recheck(
    locked: &Locked,
    buyer_id: BuyerId,
    lines: &[PurchaseLine],
) -> Result<CheckedPurchase> {
    if lines.is_empty() {
        return Err(EngineError::EmptyPurchase);
    }
    let buyer = locked
        .buyers
        .get(&buyer_id)
        .ok_or(EngineError::BuyerNotFound { buyer_id })?;

    let mut demand: BTreeMap<ProductId, u64> = BTreeMap::new();
    let mut checked = Vec::with_capacity(lines.len());
    for &line in lines {
        check_quantity(line.quantity)?;
        if !locked.sellers.contains_key(&line.seller_id) {
            return Err(EngineError::SellerNotFound {
                seller_id: line.seller_id,
            });
        }
        let product = locked
            .products
            .get(&line.product_id)
            .filter(|p| p.belongs_to(line.seller_id))
            .ok_or(EngineError::ProductNotFoundForSeller {
                product_id: line.product_id,
                seller_id: line.seller_id,
            })?;

        let wanted = demand.entry(product.id).or_default();
        *wanted += u64::from(line.quantity);
        if *wanted > u64::from(product.stock_quantity) {
            return Err(insufficient_stock(product, *wanted));
        }

        checked.push(CheckedLine {
            line,
            unit_price: product.price,
            total_amount: total_for(product, line.quantity)?,
        });
    }

    let total_amount = checked_sum(checked.iter().map(|l| l.total_amount))
        .ok_or_else(|| EngineError::AmountOverflow("purchase total".into()))?;
    if !buyer.can_afford(total_amount) {
        return Err(EngineError::InsufficientBalance {
            buyer_id,
            balance: buyer.cash_balance,
            required: total_amount,
        });
    }

    Ok(CheckedPurchase {
        buyer_id,
        lines: checked,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn line(seller: u64, product: u64, quantity: u32) -> PurchaseLine {
        PurchaseLine {
            seller_id: SellerId::new(seller),
            product_id: ProductId::new(product),
            quantity,
        }
    }

    fn locked(balance: i64, stock: u32) -> Locked {
        let now = Utc::now();
        let mut locked = Locked::default();
        locked.buyers.insert(
            BuyerId::new(1),
            Buyer {
                id: BuyerId::new(1),
                name: "Ann".into(),
                cash_balance: Decimal::from(balance),
                created_at: now,
                updated_at: now,
            },
        );
        locked.sellers.insert(
            SellerId::new(1),
            Seller {
                id: SellerId::new(1),
                name: "Corner".into(),
                cash_balance: Decimal::ZERO,
                opening_hours: phantom_core::OpeningHours::default(),
                created_at: now,
                updated_at: now,
            },
        );
        locked.products.insert(
            ProductId::new(7),
            Product {
                id: ProductId::new(7),
                seller_id: SellerId::new(1),
                name: "Masquerade (black) (6 per pack)".into(),
                price: Decimal::new(500, 2),
                stock_quantity: stock,
                created_at: now,
                updated_at: now,
            },
        );
        locked
    }

    #[test]
    fn plan_is_ordered_and_deduplicated() {
        let plan = LockPlan::for_purchase(
            BuyerId::new(9),
            &[line(2, 5, 1), line(1, 8, 1), line(2, 5, 3)],
        );
        let keys: Vec<_> = plan.keys().collect();
        assert_eq!(
            keys,
            vec![
                EntityKey::Buyer(BuyerId::new(9)),
                EntityKey::Seller(SellerId::new(1)),
                EntityKey::Seller(SellerId::new(2)),
                EntityKey::Product(ProductId::new(5)),
                EntityKey::Product(ProductId::new(8)),
            ]
        );
    }

    #[test]
    fn repeated_product_demand_is_combined() {
        let rows = locked(100, 4);
        let err = recheck(&rows, BuyerId::new(1), &[line(1, 7, 3), line(1, 7, 2)]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientStock {
                available: 4,
                requested: 5,
                ..
            }
        ));
    }

    #[test]
    fn balance_is_checked_against_the_sum() {
        let rows = locked(12, 10);
        // Each line costs 10.00 and would pass on its own.
        let err = recheck(&rows, BuyerId::new(1), &[line(1, 7, 2), line(1, 7, 2)]).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance { .. }));

        let ok = recheck(&rows, BuyerId::new(1), &[line(1, 7, 2)]).unwrap();
        assert_eq!(ok.total_amount, Decimal::new(1000, 2));
        assert_eq!(ok.lines[0].unit_price, Decimal::new(500, 2));
    }

    #[test]
    fn product_of_another_seller_is_not_found() {
        let mut rows = locked(100, 10);
        let mut other = rows.sellers[&SellerId::new(1)].clone();
        other.id = SellerId::new(2);
        rows.sellers.insert(other.id, other);

        let err = recheck(&rows, BuyerId::new(1), &[line(2, 7, 1)]).unwrap_err();
        assert_eq!(
            err,
            EngineError::ProductNotFoundForSeller {
                product_id: ProductId::new(7),
                seller_id: SellerId::new(2),
            }
        );
    }
}
