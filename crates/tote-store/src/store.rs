//! # Cart Store
//!
//! Shared cart state: line items plus panel visibility.
//!
//! ## Thread Safety
//! `CartStore` is a handle around `Arc<Mutex<_>>`. Clones share one state, so
//! the handle is what gets passed down to every part of the app that needs
//! the cart. All mutations take the lock exclusively; listeners run after it
//! is released and may call back into the store. Notification order is only
//! guaranteed for changes made from the same thread.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cart Store Operations                              │
//! │                                                                         │
//! │  Caller                    CartStore                 Effect             │
//! │  ──────                    ─────────                 ──────             │
//! │                                                                         │
//! │  "Add to cart" ──────────► increase_cart_quantity ─► qty + 1 / append  │
//! │                                                                         │
//! │  "-" button ─────────────► decrease_cart_quantity ─► qty - 1 / drop    │
//! │                                                                         │
//! │  "Remove" ───────────────► remove_from_cart ───────► drop line         │
//! │                                                                         │
//! │  Cart icon / close ──────► open_cart / close_cart ─► is_open           │
//! │                                                                         │
//! │  Any change ──► items replaced ──► PersistentCell.set (if persistent)  │
//! │             └─► lock released ──► listeners(&CartSnapshot)             │
//! │                                                                         │
//! │  No-op (e.g. decrease of absent id) ──► nothing replaced, no notify    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use tote_core::{Cart, CartSnapshot, ProductId};
use tote_storage::{
    FlushMode, PersistError, PersistentCell, Storage, StorageResult, ToteConfig, WriteBack,
    WriteBehind, WriteBehindHandle,
};

use crate::listeners::{Listener, Listeners, SubscriptionId};

// =============================================================================
// Internal State
// =============================================================================

/// Where the current item collection lives.
enum Items {
    Memory(Cart),
    Persistent(PersistentCell<Cart>),
}

impl Items {
    fn cart(&self) -> &Cart {
        match self {
            Items::Memory(cart) => cart,
            Items::Persistent(cell) => cell.get(),
        }
    }

    fn replace(&mut self, cart: Cart) {
        match self {
            Items::Memory(current) => *current = cart,
            Items::Persistent(cell) => cell.set(cart),
        }
    }
}

struct StoreState {
    items: Items,
    is_open: bool,
}

impl StoreState {
    fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::new(self.items.cart().clone(), self.is_open)
    }
}

struct Inner {
    state: Mutex<StoreState>,
    listeners: Mutex<Listeners>,
    /// Write-behind worker started by this store, stopped on `shutdown`.
    worker: Option<WriteBehindHandle>,
}

// =============================================================================
// Cart Store
// =============================================================================

/// Handle to the shared cart.
///
/// ## Usage
/// ```rust
/// use tote_core::ProductId;
/// use tote_store::CartStore;
///
/// let store = CartStore::new();
/// store.increase_cart_quantity(ProductId(1));
/// store.increase_cart_quantity(ProductId(1));
///
/// assert_eq!(store.get_item_quantity(ProductId(1)), 2);
/// assert_eq!(store.cart_quantity(), 2);
/// ```
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<Inner>,
}

impl CartStore {
    /// Creates an in-memory store: empty cart, panel closed.
    pub fn new() -> Self {
        Self::build(Items::Memory(Cart::new()), None)
    }

    /// Creates a store whose items live in `cell`.
    ///
    /// The cell has already read storage, so the first snapshot reflects any
    /// stored cart.
    pub fn persistent(cell: PersistentCell<Cart>) -> Self {
        Self::build(Items::Persistent(cell), None)
    }

    /// Opens storage under `key` with immediate writes.
    pub fn with_storage(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self::persistent(PersistentCell::new(key, storage, Cart::new()))
    }

    /// Builds a store from configuration.
    ///
    /// Coalesced mode needs a running tokio runtime for its write-behind
    /// worker; without one the store writes immediately instead.
    pub fn from_config(config: &ToteConfig) -> StorageResult<Self> {
        config.validate()?;

        if !config.persistence.enabled {
            info!("Persistence disabled, cart is in-memory");
            return Ok(Self::new());
        }

        let storage = config.open_storage()?;

        let (write_back, worker) = match config.persistence.flush_mode {
            FlushMode::Immediate => (WriteBack::Immediate, None),
            FlushMode::Coalesced => match tokio::runtime::Handle::try_current() {
                Ok(_) => {
                    let handle =
                        WriteBehind::new(Arc::clone(&storage), config.coalesce_window()).start();
                    (WriteBack::Deferred(handle.clone()), Some(handle))
                }
                Err(_) => {
                    warn!("No tokio runtime for write-behind, writing cart immediately");
                    (WriteBack::Immediate, None)
                }
            },
        };

        let cell = PersistentCell::new(config.storage.key.clone(), storage, Cart::new())
            .with_write_back(write_back);

        Ok(Self::build(Items::Persistent(cell), worker))
    }

    fn build(items: Items, worker: Option<WriteBehindHandle>) -> Self {
        let persistent = matches!(items, Items::Persistent(_));
        let store = CartStore {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState {
                    items,
                    is_open: false,
                }),
                listeners: Mutex::new(Listeners::default()),
                worker,
            }),
        };
        debug!(persistent = persistent, lines = store.with_cart(Cart::len), "Cart store created");
        store
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Quantity of `id` in the cart, 0 if absent.
    pub fn get_item_quantity(&self, id: ProductId) -> u32 {
        self.with_cart(|cart| cart.quantity_of(id))
    }

    /// Total units across all lines.
    pub fn cart_quantity(&self) -> u64 {
        self.with_cart(Cart::total_quantity)
    }

    /// Current line items. Shares its backing collection with the store.
    pub fn cart_items(&self) -> Cart {
        self.with_cart(Cart::clone)
    }

    pub fn is_open(&self) -> bool {
        self.lock_state().is_open
    }

    pub fn snapshot(&self) -> CartSnapshot {
        self.lock_state().snapshot()
    }

    /// Executes a function with read access to the cart.
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let state = self.lock_state();
        f(state.items.cart())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds one unit of `id`, appending a new line if it is not in the cart.
    pub fn increase_cart_quantity(&self, id: ProductId) {
        self.update_items("increase", id, |cart| cart.increase(id));
    }

    /// Removes one unit of `id`; the line is dropped when it reaches zero.
    /// Does nothing if `id` is not in the cart.
    pub fn decrease_cart_quantity(&self, id: ProductId) {
        self.update_items("decrease", id, |cart| cart.decrease(id));
    }

    /// Drops the line for `id` whatever its quantity.
    pub fn remove_from_cart(&self, id: ProductId) {
        self.update_items("remove", id, |cart| cart.remove(id));
    }

    pub fn open_cart(&self) {
        self.set_open(true);
    }

    pub fn close_cart(&self) {
        self.set_open(false);
    }

    fn update_items<F>(&self, op: &'static str, id: ProductId, f: F)
    where
        F: FnOnce(&mut Cart) -> bool,
    {
        let snapshot = {
            let mut state = self.lock_state();
            let mut cart = state.items.cart().clone();
            if !f(&mut cart) {
                debug!(op = op, id = %id, "Cart unchanged");
                return;
            }
            state.items.replace(cart);
            state.snapshot()
        };

        debug!(
            op = op,
            id = %id,
            quantity = snapshot.cart_items.quantity_of(id),
            total = snapshot.cart_quantity,
            "Cart updated"
        );
        self.notify(&snapshot);
    }

    fn set_open(&self, open: bool) {
        let snapshot = {
            let mut state = self.lock_state();
            if state.is_open == open {
                return;
            }
            state.is_open = open;
            state.snapshot()
        };

        debug!(is_open = open, "Cart panel toggled");
        self.notify(&snapshot);
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Calls `listener` with the new snapshot after every change.
    ///
    /// Listeners run on the thread that made the change, in subscription
    /// order, after the store lock is released. Changes made from one thread
    /// are delivered in order. Changes racing on different threads may be
    /// delivered out of order, so a listener that needs the latest state
    /// should read [`CartStore::snapshot`] rather than keep the last one it
    /// was handed.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CartSnapshot) + Send + Sync + 'static,
    {
        let id = self.lock_listeners().add(Arc::new(listener));
        debug!(subscription = %id, "Listener subscribed");
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock_listeners().remove(id);
        debug!(subscription = %id, removed = removed, "Listener unsubscribed");
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_listeners().len()
    }

    fn notify(&self, snapshot: &CartSnapshot) {
        let listeners: Vec<Listener> = self.lock_listeners().to_vec();
        for listener in &listeners {
            listener(snapshot);
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// False while storage has not yet been read successfully.
    pub fn is_hydrated(&self) -> bool {
        match &self.lock_state().items {
            Items::Memory(_) => true,
            Items::Persistent(cell) => cell.is_hydrated(),
        }
    }

    /// Retries reading storage if it was unavailable at startup.
    ///
    /// Listeners are notified when a stored cart is adopted. Returns whether
    /// that happened.
    pub fn rehydrate(&self) -> bool {
        let snapshot = {
            let mut state = self.lock_state();
            let adopted = match &mut state.items {
                Items::Memory(_) => false,
                Items::Persistent(cell) => cell.rehydrate(),
            };
            if !adopted {
                return false;
            }
            state.snapshot()
        };

        info!(total = snapshot.cart_quantity, "Cart rehydrated from storage");
        self.notify(&snapshot);
        true
    }

    /// Write failures for this store's cart. `None` for in-memory stores.
    pub fn persistence_errors(&self) -> Option<broadcast::Receiver<PersistError>> {
        match &self.lock_state().items {
            Items::Memory(_) => None,
            Items::Persistent(cell) => Some(cell.errors()),
        }
    }

    /// Waits until the latest cart has reached storage.
    pub async fn flush(&self) -> StorageResult<()> {
        let write_back = match &self.lock_state().items {
            Items::Memory(_) => return Ok(()),
            Items::Persistent(cell) => cell.write_back().clone(),
        };

        match write_back {
            WriteBack::Deferred(handle) if !handle.is_closed() => handle.flush().await,
            // Writes already go straight to storage.
            _ => Ok(()),
        }
    }

    /// Flushes and stops the write-behind worker this store started, if any.
    ///
    /// Changes made afterwards are still persisted, synchronously.
    pub async fn shutdown(&self) -> StorageResult<()> {
        self.flush().await?;
        if let Some(worker) = &self.inner.worker {
            if !worker.is_closed() {
                worker.shutdown().await?;
            }
        }
        info!("Cart store shut down");
        Ok(())
    }

    // =========================================================================
    // Locking
    // =========================================================================

    // A panicking listener never holds these locks, so a poisoned lock still
    // guards consistent data.
    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Listeners> {
        self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("CartStore")
            .field("cart_items", state.items.cart())
            .field("is_open", &state.is_open)
            .field("persistent", &matches!(state.items, Items::Persistent(_)))
            .finish_non_exhaustive()
    }
}
