//! Commit stage: apply a rechecked purchase to its locked rows.
//!
//! All writes go into the unit of work; nothing is visible until the caller
//! commits it. The buyer is charged once with the purchase total, each seller
//! is credited with the sum of its lines, and one record is appended per line.

use std::collections::BTreeMap;

use chrono::Utc;
use phantom_core::{Decimal, NewPurchase, PurchaseRecord, SellerId};
use phantom_store::UnitOfWork;

use crate::error::{EngineError, Result};
use crate::lock::{CheckedPurchase, Locked};
use crate::validate::insufficient_stock;

pub(crate) fn apply<U: UnitOfWork>(
    unit: &mut U,
    mut locked: Locked,
    purchase: &CheckedPurchase,
) -> Result<Vec<PurchaseRecord>> {
    let purchased_at = Utc::now();

    let mut credits: BTreeMap<SellerId, Decimal> = BTreeMap::new();
    for checked in &purchase.lines {
        let line = checked.line;
        let product = locked.products.get_mut(&line.product_id).ok_or_else(|| {
            EngineError::Internal(format!("product {} not locked", line.product_id))
        })?;
        let Some(remaining) = product.remove_stock(line.quantity) else {
            return Err(insufficient_stock(product, u64::from(line.quantity)));
        };
        product.stock_quantity = remaining;

        let credit = credits.entry(line.seller_id).or_default();
        *credit = credit
            .checked_add(checked.total_amount)
            .ok_or_else(|| {
                EngineError::AmountOverflow(format!("credit to seller {}", line.seller_id))
            })?;
    }

    let buyer = locked.buyers.get_mut(&purchase.buyer_id).ok_or_else(|| {
        EngineError::Internal(format!("buyer {} not locked", purchase.buyer_id))
    })?;
    buyer.cash_balance -= purchase.total_amount;
    unit.update_buyer(buyer)?;

    for (seller_id, amount) in credits {
        let seller = locked.sellers.get_mut(&seller_id).ok_or_else(|| {
            EngineError::Internal(format!("seller {seller_id} not locked"))
        })?;
        seller.cash_balance = seller
            .cash_balance
            .checked_add(amount)
            .ok_or_else(|| EngineError::AmountOverflow(format!("balance of seller {seller_id}")))?;
        unit.update_seller(seller)?;
    }

    for checked in &purchase.lines {
        if let Some(product) = locked.products.remove(&checked.line.product_id) {
            unit.update_product(&product)?;
        }
    }

    purchase
        .lines
        .iter()
        .map(|checked| {
            unit.insert_purchase(NewPurchase {
                buyer_id: purchase.buyer_id,
                seller_id: checked.line.seller_id,
                product_id: checked.line.product_id,
                quantity: checked.line.quantity,
                unit_price: checked.unit_price,
                total_amount: checked.total_amount,
                purchased_at,
            })
            .map_err(EngineError::from)
        })
        .collect()
}
