//! Seller (pharmacy) records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::SellerId;

/// A seller holding inventory and a cash balance.
///
/// The balance only grows through purchases; it is never observed negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    /// Seller ID.
    pub id: SellerId,

    /// Display name.
    pub name: String,

    /// Cash balance, never negative.
    pub cash_balance: Decimal,

    /// Weekly schedule. Only the query layer reads this.
    #[serde(default)]
    pub opening_hours: OpeningHours,

    /// When the seller was created.
    pub created_at: DateTime<Utc>,

    /// When the seller was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a seller through the loading path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSeller {
    /// Display name.
    pub name: String,
    /// Opening cash balance.
    pub cash_balance: Decimal,
    /// Weekly schedule.
    #[serde(default)]
    pub opening_hours: OpeningHours,
}

impl NewSeller {
    /// A seller with the given name and balance and no schedule.
    #[must_use]
    pub fn new(name: impl Into<String>, cash_balance: Decimal) -> Self {
        Self {
            name: name.into(),
            cash_balance,
            opening_hours: OpeningHours::default(),
        }
    }
}

/// Opening hours keyed by lowercase weekday name (`"monday"` .. `"sunday"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpeningHours(pub BTreeMap<String, DailyHours>);

/// One day's opening window, as `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyHours {
    /// Opening time.
    pub open: String,
    /// Closing time.
    pub close: String,
}
