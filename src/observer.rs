//! Listener Registry
//! Mission: Fan a value out to every registered callback, in registration order

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    next_token: u64,
    callbacks: BTreeMap<u64, Callback<T>>,
}

/// Token-keyed callback set. Tokens grow monotonically, so iterating the
/// map yields callbacks in the order they were added.
pub struct ListenerRegistry<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_token: 0,
                callbacks: BTreeMap::new(),
            })),
        }
    }

    /// Register a callback and get back the handle that removes it.
    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let token = inner.next_token;
        inner.next_token += 1;
        inner.callbacks.insert(token, Arc::new(callback));
        drop(inner);

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            remove: Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().callbacks.remove(&token);
                }
            }),
            done: AtomicBool::new(false),
        }
    }

    /// Invoke every callback with `value`.
    ///
    /// The set is snapshotted first and the lock released, so callbacks may
    /// subscribe, unsubscribe or trigger another notification.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self.inner.lock().callbacks.values().cloned().collect();
        for callback in snapshot {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().callbacks.clear();
    }
}

impl<T: 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposer returned by [`ListenerRegistry::add`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    remove: Box<dyn Fn() + Send + Sync>,
    done: AtomicBool,
}

impl Subscription {
    /// Remove the callback. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            (self.remove)();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.done.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
