//! # Line Items
//!
//! A line item is one distinct product's count in the cart.
//!
//! ## Quantity Invariant
//! Quantities are `NonZeroU32`, so a line item with quantity 0 cannot be
//! constructed or deserialized. Decrementing past 1 yields `None`, and the
//! caller drops the item from the collection.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Product Id
// =============================================================================

/// Catalog identifier of a product.
///
/// Serialized as a bare integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct ProductId(pub u32);

impl From<u32> for ProductId {
    fn from(id: u32) -> Self {
        ProductId(id)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ProductId)
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// An entry in the cart: which product, and how many.
///
/// Persisted form: `{"id": 3, "quantity": 5}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    /// Product this line refers to.
    pub id: ProductId,

    /// Units of the product, always at least 1.
    #[ts(type = "number")]
    pub quantity: NonZeroU32,
}

impl CartItem {
    /// A fresh line holding a single unit.
    pub const fn single(id: ProductId) -> Self {
        CartItem {
            id,
            quantity: NonZeroU32::MIN,
        }
    }

    /// Quantity as a plain integer.
    #[inline]
    pub const fn quantity(&self) -> u32 {
        self.quantity.get()
    }

    /// One more unit. Saturates at `u32::MAX`.
    #[must_use]
    pub const fn incremented(self) -> Self {
        CartItem {
            id: self.id,
            quantity: self.quantity.saturating_add(1),
        }
    }

    /// One fewer unit, or `None` when the line would reach zero.
    #[must_use]
    pub fn decremented(self) -> Option<Self> {
        NonZeroU32::new(self.quantity.get() - 1).map(|quantity| CartItem {
            id: self.id,
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_starts_at_one() {
        let item = CartItem::single(ProductId(5));
        assert_eq!(item.quantity(), 1);
    }

    #[test]
    fn test_increment_and_decrement() {
        let item = CartItem::single(ProductId(5)).incremented().incremented();
        assert_eq!(item.quantity(), 3);

        let item = item.decremented().unwrap();
        assert_eq!(item.quantity(), 2);
    }

    #[test]
    fn test_decrement_from_one_is_none() {
        assert!(CartItem::single(ProductId(1)).decremented().is_none());
    }

    #[test]
    fn test_increment_saturates() {
        let item = CartItem {
            id: ProductId(1),
            quantity: NonZeroU32::MAX,
        };
        assert_eq!(item.incremented().quantity(), u32::MAX);
    }

    #[test]
    fn test_json_shape() {
        let item = CartItem::single(ProductId(3)).incremented();
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"id":3,"quantity":2}"#);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let parsed = serde_json::from_str::<CartItem>(r#"{"id":3,"quantity":0}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_product_id_parse() {
        assert_eq!(" 42 ".parse::<ProductId>().unwrap(), ProductId(42));
        assert!("abc".parse::<ProductId>().is_err());
    }
}
