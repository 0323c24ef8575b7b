//! Subscription handles and the registry that fans pushed events out to
//! them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::debug;

use super::change_event::{ChangeEvent, ChangeEventType, Table};

/// Callback invoked for every matching pushed event.
pub type ChangeCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

struct Listener {
    id: u64,
    table: Table,
    event_type: ChangeEventType,
    callback: ChangeCallback,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl RegistryInner {
    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }
}

/// Shared table of active listeners.
///
/// Change feeds own one registry and call [`SubscriptionRegistry::dispatch`]
/// for every event they receive; consumers only ever see [`Subscription`]
/// handles.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        table: Table,
        event_type: ChangeEventType,
        callback: ChangeCallback,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Listener {
                id,
                table,
                event_type,
                callback,
            });
        debug!("Subscribed #{} to {} {}", id, table, event_type.as_str());
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
            active: AtomicBool::new(true),
        }
    }

    /// Delivers `event` to every matching listener, in subscription order.
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let targets: Vec<ChangeCallback> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|l| l.table == event.table && l.event_type.accepts(event.event_type))
            .map(|l| l.callback.clone())
            .collect();

        for callback in &targets {
            callback(event.clone());
        }
        targets.len()
    }

    /// Number of active listeners.
    pub fn len(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for one registered callback.
///
/// `unsubscribe` is idempotent, and dropping the handle unsubscribes.
pub struct Subscription {
    id: u64,
    registry: Weak<RegistryInner>,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                debug!("Unsubscribed #{}", self.id);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
