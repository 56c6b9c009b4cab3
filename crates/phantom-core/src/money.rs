//! Money arithmetic.
//!
//! Balances and prices are `Decimal`, never floating point, so a line total is
//! exactly `unit_price * quantity` and sums of line totals are exact.

use rust_decimal::Decimal;

/// Compute `unit_price * quantity`, or `None` on overflow.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity))
}

/// Sum a sequence of amounts, or `None` on overflow.
pub fn checked_sum<I>(amounts: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
}

/// Prices must be strictly positive.
#[must_use]
pub fn is_valid_price(price: Decimal) -> bool {
    price > Decimal::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total_is_exact() {
        let price = Decimal::new(1999, 2); // 19.99
        assert_eq!(line_total(price, 3), Some(Decimal::new(5997, 2)));
    }

    #[test]
    fn line_total_overflow() {
        assert_eq!(line_total(Decimal::MAX, 2), None);
    }

    #[test]
    fn checked_sum_of_totals() {
        let totals = [Decimal::new(1000, 2), Decimal::new(250, 2), Decimal::ONE];
        assert_eq!(checked_sum(totals), Some(Decimal::new(1350, 2)));
        assert_eq!(checked_sum(Vec::new()), Some(Decimal::ZERO));
        assert_eq!(checked_sum([Decimal::MAX, Decimal::ONE]), None);
    }

    #[test]
    fn price_validity() {
        assert!(is_valid_price(Decimal::new(1, 2)));
        assert!(!is_valid_price(Decimal::ZERO));
        assert!(!is_valid_price(Decimal::new(-5, 0)));
    }
}
