//! Listener registry with owned subscription tokens
//!
//! Event sources (bridge, renderer) embed an `EventHub` per stream and hand out
//! a `Subscription` on every subscribe. Releasing the token removes the
//! listener; releasing twice is a no-op, and dropping the token releases it.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Boxed event callback
pub type Listener<T> = Box<dyn Fn(T) + Send + Sync>;

struct HubInner<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Fan-out registry for one event stream
pub struct EventHub<T> {
    inner: Arc<Mutex<HubInner<T>>>,
}

impl<T: Clone + Send + 'static> EventHub<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener
    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, listener));
            id
        };

        let weak: Weak<Mutex<HubInner<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().listeners.retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Deliver an event to every listener
    pub fn emit(&self, event: T) {
        let inner = self.inner.lock();
        for (_, listener) in inner.listeners.iter() {
            listener(event.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

/// Clones share the same listener set
impl<T> Clone for EventHub<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned handle for one registered listener
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Remove the listener; later calls do nothing
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
