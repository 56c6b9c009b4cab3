//! Identifier types for the marketplace ledger.
//!
//! Every record is keyed by an opaque positive integer that never changes once
//! assigned. The `int_id_type!` macro keeps the four identifier types from
//! drifting apart in how they parse, print, and encode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Macro to define an integer identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `u64` with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - `Serialize`, `Deserialize` (as a bare integer)
/// - `FromStr`, `Display`, `Debug`
/// - `From<u64>`
///
/// Identifiers order by their numeric value, which is what the lock ordering
/// relies on.
macro_rules! int_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Create an identifier from its raw value.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the raw value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Big-endian bytes, so byte order matches numeric order.
            #[must_use]
            pub const fn to_be_bytes(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            /// Decode from big-endian bytes.
            #[must_use]
            pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
                Self(u64::from_be_bytes(bytes))
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw: u64 = s
                    .trim()
                    .parse()
                    .map_err(|_| IdError::NotAnInteger(s.to_string()))?;
                if raw == 0 {
                    return Err(IdError::Zero);
                }
                Ok(Self(raw))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

int_id_type!(SellerId, "A seller (pharmacy) identifier.");
int_id_type!(
    ProductId,
    "A product (mask) identifier.\n\nProducts are owned by exactly one seller."
);
int_id_type!(BuyerId, "A buyer (user) identifier.");
int_id_type!(
    PurchaseId,
    "A purchase record identifier.\n\nAllocated when a unit of work inserts the record. Units \
     commit independently, so a larger id does not imply a later commit."
);

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not an unsigned integer.
    #[error("invalid identifier: {0:?}")]
    NotAnInteger(String),

    /// Zero is never assigned.
    #[error("identifier must be positive")]
    Zero,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let id: BuyerId = "42".parse().unwrap();
        assert_eq!(id, BuyerId::new(42));
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "BuyerId(42)");
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert_eq!("0".parse::<SellerId>(), Err(IdError::Zero));
        assert!(matches!(
            "abc".parse::<ProductId>(),
            Err(IdError::NotAnInteger(_))
        ));
        assert!("-3".parse::<ProductId>().is_err());
    }

    #[test]
    fn serde_is_a_bare_integer() {
        let json = serde_json::to_string(&PurchaseId::new(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: PurchaseId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, PurchaseId::new(7));
    }

    #[test]
    fn byte_order_matches_numeric_order() {
        let small = ProductId::new(255).to_be_bytes();
        let large = ProductId::new(256).to_be_bytes();
        assert!(small < large);
        assert_eq!(ProductId::from_be_bytes(large), ProductId::new(256));
    }
}
