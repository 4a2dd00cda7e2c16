//! # tote-store: Cart Store
//!
//! The shared cart every consumer reads from and mutates through.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Cart Store                                    │
//! │                                                                         │
//! │   catalog page ─┐                                                       │
//! │   cart panel ───┼──► CartStore (clone) ──► Mutex<StoreState>            │
//! │   header badge ─┘          │                  ├── items: Cart           │
//! │                            │                  │     └─ PersistentCell   │
//! │                            │                  │        (optional)       │
//! │                            │                  └── is_open: bool         │
//! │                            ▼                                            │
//! │                  listeners(&CartSnapshot)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `CartStore` and its operations
//! - [`listeners`] - Subscription registry

pub mod listeners;
pub mod store;

pub use listeners::{Listener, SubscriptionId};
pub use store::CartStore;
