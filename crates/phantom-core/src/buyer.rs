//! Buyer (user) records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::BuyerId;

/// A buyer spending from a cash balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    /// Buyer ID.
    pub id: BuyerId,

    /// Display name.
    pub name: String,

    /// Cash balance, never negative.
    pub cash_balance: Decimal,

    /// When the buyer was created.
    pub created_at: DateTime<Utc>,

    /// When the buyer was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Buyer {
    /// Check if the balance covers `amount`.
    #[must_use]
    pub fn can_afford(&self, amount: Decimal) -> bool {
        self.cash_balance >= amount
    }
}

/// Input for creating a buyer through the loading path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBuyer {
    /// Display name.
    pub name: String,
    /// Opening cash balance.
    pub cash_balance: Decimal,
}

impl NewBuyer {
    /// A buyer with the given name and balance.
    #[must_use]
    pub fn new(name: impl Into<String>, cash_balance: Decimal) -> Self {
        Self {
            name: name.into(),
            cash_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_afford_is_inclusive() {
        let now = Utc::now();
        let buyer = Buyer {
            id: BuyerId::new(1),
            name: "Ann".into(),
            cash_balance: Decimal::new(1000, 2),
            created_at: now,
            updated_at: now,
        };
        assert!(buyer.can_afford(Decimal::new(999, 2)));
        assert!(buyer.can_afford(Decimal::new(1000, 2)));
        assert!(!buyer.can_afford(Decimal::new(1001, 2)));
    }
}
