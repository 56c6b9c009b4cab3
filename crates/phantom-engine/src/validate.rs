//! Validation stage: lock-free existence and precondition checks.
//!
//! Results here are advisory. Nothing is locked, so every check is repeated
//! by [`crate::lock::recheck`] once the rows are held.

use phantom_core::money::{checked_sum, line_total};
use phantom_core::{Buyer, BuyerId, Decimal, Product, PurchaseLine, Seller};
use phantom_store::UnitOfWork;
use serde::Serialize;

use crate::error::{EngineError, Result};

/// One line item that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedItem {
    /// The paying buyer, as read.
    pub buyer: Buyer,
    /// The seller, as read.
    pub seller: Seller,
    /// The product, as read.
    pub product: Product,
    /// Units requested.
    pub quantity: u32,
    /// `product.price * quantity`.
    pub total_amount: Decimal,
}

pub(crate) fn check_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(EngineError::InvalidQuantity { quantity });
    }
    Ok(())
}

pub(crate) fn total_for(product: &Product, quantity: u32) -> Result<Decimal> {
    line_total(product.price, quantity).ok_or_else(|| {
        EngineError::AmountOverflow(format!("{} x {quantity}", product.price))
    })
}

pub(crate) fn insufficient_stock(product: &Product, requested: u64) -> EngineError {
    EngineError::InsufficientStock {
        product_id: product.id,
        product_name: product.name.clone(),
        available: product.stock_quantity,
        requested,
    }
}

pub(crate) fn find_buyer<U: UnitOfWork>(unit: &U, buyer_id: BuyerId) -> Result<Buyer> {
    unit.find_buyer(buyer_id)?
        .ok_or(EngineError::BuyerNotFound { buyer_id })
}

/// Validate one line against a buyer already read.
pub(crate) fn validate_line<U: UnitOfWork>(
    unit: &U,
    buyer: &Buyer,
    line: PurchaseLine,
) -> Result<ValidatedItem> {
    check_quantity(line.quantity)?;

    let seller = unit
        .find_seller(line.seller_id)?
        .ok_or(EngineError::SellerNotFound {
            seller_id: line.seller_id,
        })?;
    let product = unit
        .find_product(line.product_id, line.seller_id)?
        .ok_or(EngineError::ProductNotFoundForSeller {
            product_id: line.product_id,
            seller_id: line.seller_id,
        })?;

    if !product.has_stock(line.quantity) {
        return Err(insufficient_stock(&product, u64::from(line.quantity)));
    }

    let total_amount = total_for(&product, line.quantity)?;
    if !buyer.can_afford(total_amount) {
        return Err(EngineError::InsufficientBalance {
            buyer_id: buyer.id,
            balance: buyer.cash_balance,
            required: total_amount,
        });
    }

    Ok(ValidatedItem {
        buyer: buyer.clone(),
        seller,
        product,
        quantity: line.quantity,
        total_amount,
    })
}

/// Validate every line, then the buyer's balance against the sum.
pub(crate) fn validate_lines<U: UnitOfWork>(
    unit: &U,
    buyer_id: BuyerId,
    lines: &[PurchaseLine],
) -> Result<Vec<ValidatedItem>> {
    if lines.is_empty() {
        return Err(EngineError::EmptyPurchase);
    }

    let buyer = find_buyer(unit, buyer_id)?;
    let items = lines
        .iter()
        .map(|&line| validate_line(unit, &buyer, line))
        .collect::<Result<Vec<_>>>()?;

    let total = checked_sum(items.iter().map(|i| i.total_amount))
        .ok_or_else(|| EngineError::AmountOverflow("purchase total".into()))?;
    if !buyer.can_afford(total) {
        return Err(EngineError::InsufficientBalance {
            buyer_id,
            balance: buyer.cash_balance,
            required: total,
        });
    }
    Ok(items)
}
