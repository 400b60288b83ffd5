//! Refresh observers as disposable subscription handles

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::trace;

use super::ChannelSnapshot;

pub type RefreshCallback = Arc<dyn Fn(&ChannelSnapshot) + Send + Sync>;

type CallbackTable = Mutex<BTreeMap<u64, RefreshCallback>>;

#[derive(Default)]
pub struct RefreshCallbacks {
    table: Arc<CallbackTable>,
    next_id: AtomicU64,
}

impl RefreshCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: RefreshCallback) -> RefreshSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.table).insert(id, callback);
        trace!("Registered refresh callback {}", id);
        RefreshSubscription {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback in registration order. The table lock is not
    /// held while callbacks run, so a callback may drop its own handle.
    pub fn fire(&self, snapshot: &ChannelSnapshot) {
        let callbacks: Vec<RefreshCallback> = lock(&self.table).values().cloned().collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }
}

/// Registration handle; the callback is removed when the handle is dropped
pub struct RefreshSubscription {
    id: u64,
    table: Weak<CallbackTable>,
}

impl RefreshSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for RefreshSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshSubscription")
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for RefreshSubscription {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            lock(&table).remove(&self.id);
            trace!("Removed refresh callback {}", self.id);
        }
    }
}

fn lock(table: &CallbackTable) -> std::sync::MutexGuard<'_, BTreeMap<u64, RefreshCallback>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_dropping_handle_unregisters_only_that_callback() {
        let callbacks = RefreshCallbacks::new();
        let first_hits = Arc::new(AtomicUsize::new(0));
        let second_hits = Arc::new(AtomicUsize::new(0));

        let first = {
            let hits = first_hits.clone();
            callbacks.register(Arc::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
        };
        let _second = {
            let hits = second_hits.clone();
            callbacks.register(Arc::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
        };

        let snapshot = ChannelSnapshot::default();
        callbacks.fire(&snapshot);
        drop(first);
        callbacks.fire(&snapshot);

        assert_eq!(first_hits.load(Ordering::SeqCst), 1);
        assert_eq!(second_hits.load(Ordering::SeqCst), 2);
        assert_eq!(callbacks.len(), 1);
    }

    #[test]
    fn test_same_closure_registered_twice_is_two_subscriptions() {
        let callbacks = RefreshCallbacks::new();
        let callback: RefreshCallback = Arc::new(|_| {});
        let a = callbacks.register(callback.clone());
        let b = callbacks.register(callback);

        assert_ne!(a.id(), b.id());
        drop(a);
        assert_eq!(callbacks.len(), 1);
    }
}
