//! Subscriber registry for cart changes.

use std::fmt;
use std::sync::Arc;

use tote_core::CartSnapshot;

/// Callback invoked with the new snapshot after every observable change.
pub type Listener = Arc<dyn Fn(&CartSnapshot) + Send + Sync>;

/// Token returned by [`crate::CartStore::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Listeners in subscription order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, listener: Listener) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, listener));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    /// Copies the current listeners so they can be called without holding a
    /// lock.
    pub(crate) fn to_vec(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
