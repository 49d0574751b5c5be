//! [`ListenerRegistry`] – add/remove-by-reference callback list.
//!
//! Notification iterates a snapshot taken at call time, so a callback that
//! unregisters itself (or any other listener) mid-delivery cannot disturb the
//! in-progress iteration.  A listener that panics is logged and skipped; the
//! remaining listeners still receive the value.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use tillsight_middleware::ListenerRegistry;
//!
//! let registry = ListenerRegistry::<u32>::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let seen_in_cb = Arc::clone(&seen);
//! let sub = registry.add(move |v| {
//!     seen_in_cb.fetch_add(*v as usize, Ordering::SeqCst);
//! });
//!
//! registry.notify(&5);
//! sub.unsubscribe();
//! registry.notify(&5);
//! assert_eq!(seen.load(Ordering::SeqCst), 5);
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::error;

/// A shared callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifier handed out for every registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Inner<T> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<T>)>,
}

/// Callback list shared by the status monitor, the battery alert engine and
/// the simulated battery event stream.
///
/// Cloning is cheap; clones share the same list.
pub struct ListenerRegistry<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure and return the handle that removes it.
    pub fn add(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        self.add_listener(Arc::new(listener))
    }

    /// Register an already-shared listener.  Registering the same `Arc` twice
    /// yields two independent registrations.
    pub fn add_listener(&self, listener: Listener<T>) -> Subscription<T> {
        let mut inner = lock(&self.inner);
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Remove the registration with `id`.  Returns `false` if it was already
    /// gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = lock(&self.inner);
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
        inner.entries.len() != before
    }

    /// Remove every registration of `listener`, compared by reference.
    pub fn remove_listener(&self, listener: &Listener<T>) -> bool {
        let mut inner = lock(&self.inner);
        let before = inner.entries.len();
        inner
            .entries
            .retain(|(_, entry)| !Arc::ptr_eq(entry, listener));
        inner.entries.len() != before
    }

    pub fn clear(&self) {
        lock(&self.inner).entries.clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `value` to every listener registered at the time of the call.
    ///
    /// Returns the number of listeners that completed without panicking.
    pub fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<(ListenerId, Listener<T>)> = lock(&self.inner).entries.clone();
        let mut delivered = 0;
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(value))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(listener = ?id, "listener panicked; continuing delivery"),
            }
        }
        delivered
    }
}

/// Handle returned by [`ListenerRegistry::add`].
///
/// Holds only a weak reference to the registry, so an outstanding handle
/// never keeps a dropped registry alive.  Dropping the handle does *not*
/// unregister the listener; call [`Subscription::unsubscribe`].
pub struct Subscription<T> {
    id: ListenerId,
    registry: Weak<Mutex<Inner<T>>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove exactly this registration.  Returns `false` when it had already
    /// been removed or the registry no longer exists.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut inner = lock(&inner);
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != self.id);
        inner.entries.len() != before
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

fn lock<T>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: &u32| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn notify_reaches_every_listener() {
        let registry = ListenerRegistry::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        registry.add(cb_a);
        registry.add(cb_b);

        assert_eq!(registry.notify(&1), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let registry = ListenerRegistry::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        let sub_a = registry.add(cb_a);
        registry.add(cb_b);

        assert!(sub_a.unsubscribe());
        registry.notify(&1);
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_listener_compares_by_reference() {
        let registry = ListenerRegistry::<u32>::new();
        let shared: Listener<u32> = Arc::new(|_| {});
        let other: Listener<u32> = Arc::new(|_| {});
        registry.add_listener(Arc::clone(&shared));
        registry.add_listener(other);

        assert!(registry.remove_listener(&shared));
        assert!(!registry.remove_listener(&shared));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn listener_removing_itself_mid_notify_is_safe() {
        let registry = ListenerRegistry::<u32>::new();
        let (later, cb_later) = counter();

        let registry_in_cb = registry.clone();
        let first_id = Arc::new(Mutex::new(None::<ListenerId>));
        let first_id_in_cb = Arc::clone(&first_id);
        let sub = registry.add(move |_| {
            if let Some(id) = *first_id_in_cb.lock().unwrap() {
                registry_in_cb.remove(id);
            }
        });
        *first_id.lock().unwrap() = Some(sub.id());
        registry.add(cb_later);

        // The snapshot still delivers to the second listener.
        assert_eq!(registry.notify(&7), 2);
        assert_eq!(later.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn listener_clearing_registry_mid_notify_is_safe() {
        let registry = ListenerRegistry::<u32>::new();
        let registry_in_cb = registry.clone();
        registry.add(move |_| registry_in_cb.clear());
        let (later, cb_later) = counter();
        registry.add(cb_later);

        registry.notify(&1);
        assert_eq!(later.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());

        registry.notify(&1);
        assert_eq!(later.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let registry = ListenerRegistry::<u32>::new();
        registry.add(|_| panic!("listener failure"));
        let (after, cb_after) = counter();
        registry.add(cb_after);

        assert_eq!(registry.notify(&3), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let registry = ListenerRegistry::<u32>::new();
        let sub = registry.add(|_| {});
        drop(registry);
        assert!(!sub.unsubscribe());
    }
}
