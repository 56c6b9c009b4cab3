//! Row constraints every backend enforces on write.
//!
//! These play the role of database CHECK constraints. The engine validates
//! the same rules earlier and reports them as business errors; reaching one
//! of these means a caller skipped that validation.

use phantom_core::money::{is_valid_price, line_total};
use phantom_core::{Buyer, Decimal, NewPurchase, Product, Seller};

use crate::error::{Result, StoreError};

pub(crate) fn balance(what: &str, id: u64, balance: Decimal) -> Result<()> {
    if balance < Decimal::ZERO {
        return Err(StoreError::Constraint(format!(
            "{what} {id} balance would be negative: {balance}"
        )));
    }
    Ok(())
}

pub(crate) fn buyer(row: &Buyer) -> Result<()> {
    balance("buyer", row.id.get(), row.cash_balance)
}

pub(crate) fn seller(row: &Seller) -> Result<()> {
    balance("seller", row.id.get(), row.cash_balance)
}

pub(crate) fn price(name: &str, price: Decimal) -> Result<()> {
    if !is_valid_price(price) {
        return Err(StoreError::Constraint(format!(
            "product {name:?} price must be positive: {price}"
        )));
    }
    Ok(())
}

pub(crate) fn product(row: &Product) -> Result<()> {
    price(&row.name, row.price)
}

pub(crate) fn purchase(row: &NewPurchase) -> Result<()> {
    if row.quantity == 0 {
        return Err(StoreError::Constraint(
            "purchase quantity must be positive".into(),
        ));
    }
    if line_total(row.unit_price, row.quantity) != Some(row.total_amount) {
        return Err(StoreError::Constraint(format!(
            "purchase total {} != {} x {}",
            row.total_amount, row.unit_price, row.quantity
        )));
    }
    Ok(())
}
