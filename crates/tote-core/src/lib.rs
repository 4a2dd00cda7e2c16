//! # tote-core: Pure Cart Model for Tote
//!
//! This crate holds the cart data model and its bookkeeping rules as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tote Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Presentation layer (consumer)                  │   │
//! │  │    Store page ──► Item card ──► Cart panel ──► Nav badge        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CartStore handle                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tote-store (CartStore, subscriptions)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tote-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   item    │  │   cart    │  │  catalog  │  │   error   │  │   │
//! │  │   │ ProductId │  │   Cart    │  │ StoreItem │  │ CoreError │  │   │
//! │  │   │ CartItem  │  │ Snapshot  │  │  Catalog  │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO RUNTIME • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`item`] - `ProductId` and `CartItem`
//! - [`cart`] - The line-item collection and consumer snapshots
//! - [`catalog`] - Product descriptors read by the presentation layer
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tote_core::{Cart, ProductId};
//!
//! let mut cart = Cart::new();
//! cart.increase(ProductId(1));
//! cart.increase(ProductId(1));
//! cart.increase(ProductId(7));
//!
//! assert_eq!(cart.quantity_of(ProductId(1)), 2);
//! assert_eq!(cart.total_quantity(), 3);
//!
//! cart.decrease(ProductId(7));
//! assert_eq!(cart.quantity_of(ProductId(7)), 0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod error;
pub mod item;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartSnapshot};
pub use catalog::{format_currency, Catalog, StoreItem};
pub use error::{CoreError, CoreResult};
pub use item::{CartItem, ProductId};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Storage key the cart's line items are persisted under.
pub const DEFAULT_STORAGE_KEY: &str = "shopping-cart";
