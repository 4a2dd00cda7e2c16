//! # Cart Collection
//!
//! The line-item collection and the snapshot handed to consumers.
//!
//! ## Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Line-Item Presence per Product                       │
//! │                                                                         │
//! │                    increase                 increase                    │
//! │   ┌──────────┐ ─────────────► ┌────────────┐ ──────► ┌──────────────┐  │
//! │   │  Absent  │                │ Present(1) │         │ Present(q>1) │  │
//! │   └──────────┘ ◄───────────── └────────────┘ ◄────── └──────────────┘  │
//! │        ▲          decrease                  decrease        │          │
//! │        │                                                    │          │
//! │        └──────────────────── remove (from any) ─────────────┘          │
//! │                                                                         │
//! │   decrease / remove on Absent: no-op, collection untouched             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Collection Replacement
//! Items live behind an `Arc<[CartItem]>`. Every change builds a fresh slice
//! and swaps the `Arc`, so a snapshot taken earlier keeps pointing at the old
//! contents and consumers can tell "changed" from "unchanged" with
//! [`Cart::ptr_eq`]. No-op calls leave the `Arc` untouched.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use ts_rs::TS;

use crate::error::CoreError;
use crate::item::{CartItem, ProductId};

// =============================================================================
// Cart
// =============================================================================

/// Ordered collection of line items, unique by product id.
///
/// ## Invariants
/// - No two items share an id
/// - Every quantity is at least 1 (guaranteed by [`CartItem`])
/// - New products are appended; existing lines keep their position
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<CartItem>")]
pub struct Cart {
    items: Arc<[CartItem]>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Cart {
            items: Arc::from(Vec::new()),
        }
    }

    /// Builds a cart from existing line items, rejecting duplicate ids.
    pub fn from_items(items: Vec<CartItem>) -> Result<Self, CoreError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id) {
                return Err(CoreError::DuplicateItem(item.id));
            }
        }
        Ok(Cart {
            items: Arc::from(items),
        })
    }

    /// The line items, in insertion order.
    #[inline]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CartItem> {
        self.items.iter()
    }

    /// Number of distinct products.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when both carts share the same backing collection.
    pub fn ptr_eq(&self, other: &Cart) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }

    /// Quantity held for `id`, or 0 when absent.
    pub fn quantity_of(&self, id: ProductId) -> u32 {
        self.find(id).map_or(0, CartItem::quantity)
    }

    /// Sum of all quantities. Computed on every call.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity())).sum()
    }

    /// Adds one unit of `id`, appending a new line when absent.
    ///
    /// Returns `false` only when the line is already saturated at `u32::MAX`.
    pub fn increase(&mut self, id: ProductId) -> bool {
        match self.find(id) {
            None => {
                let items = self
                    .items
                    .iter()
                    .copied()
                    .chain(std::iter::once(CartItem::single(id)))
                    .collect();
                self.items = items;
                true
            }
            Some(existing) if existing.quantity() == u32::MAX => false,
            Some(_) => {
                self.items = self
                    .items
                    .iter()
                    .map(|i| if i.id == id { i.incremented() } else { *i })
                    .collect();
                true
            }
        }
    }

    /// Removes one unit of `id`. A line holding a single unit is dropped.
    ///
    /// Returns `false` (and changes nothing) when `id` is absent.
    pub fn decrease(&mut self, id: ProductId) -> bool {
        if self.find(id).is_none() {
            return false;
        }
        self.items = self
            .items
            .iter()
            .filter_map(|i| if i.id == id { i.decremented() } else { Some(*i) })
            .collect();
        true
    }

    /// Drops the line for `id` entirely.
    ///
    /// Returns `false` (and changes nothing) when `id` is absent.
    pub fn remove(&mut self, id: ProductId) -> bool {
        if self.find(id).is_none() {
            return false;
        }
        self.items = self.items.iter().filter(|i| i.id != id).copied().collect();
        true
    }

    fn find(&self, id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<CartItem>> for Cart {
    type Error = CoreError;

    fn try_from(items: Vec<CartItem>) -> Result<Self, Self::Error> {
        Cart::from_items(items)
    }
}

/// Serialized as a plain JSON array of `{id, quantity}` records.
impl Serialize for Cart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartItem;
    type IntoIter = std::slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Immutable view of cart state at one point in time.
///
/// This is what subscribers receive and what the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartSnapshot {
    /// Line items. Shares its backing collection with the store.
    #[ts(as = "Vec<CartItem>")]
    pub cart_items: Cart,

    /// Total units across all lines.
    #[ts(type = "number")]
    pub cart_quantity: u64,

    /// Whether the cart panel is open.
    pub is_open: bool,
}

impl CartSnapshot {
    pub fn new(cart_items: Cart, is_open: bool) -> Self {
        let cart_quantity = cart_items.total_quantity();
        CartSnapshot {
            cart_items,
            cart_quantity,
            is_open,
        }
    }
}

impl Default for CartSnapshot {
    fn default() -> Self {
        CartSnapshot::new(Cart::new(), false)
    }
}
