//! Observer registry shared by the controller and hardware feeds.
//!
//! `Callbacks<T>` keeps an ordered list of listeners, each addressable by a
//! `CallbackId` so it can be removed again. The controller uses it for UI
//! observers of the virtual brightness, and `BrightnessFeed` uses it for
//! hardware brightness subscribers.
//!
//! Everything here runs on one thread; listeners are `Rc<dyn Fn(&T)>`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

impl CallbackId {
    fn next() -> Self {
        Self(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

struct Listener<T> {
    id: CallbackId,
    callback: Rc<dyn Fn(&T)>,
}

/// A registry of listeners notified in registration order.
pub struct Callbacks<T> {
    listeners: RefCell<Vec<Listener<T>>>,
}

impl<T> Callbacks<T> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Register a listener and return the id needed to remove it.
    pub fn register<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&T) + 'static,
    {
        let id = CallbackId::next();
        self.listeners.borrow_mut().push(Listener {
            id,
            callback: Rc::new(callback),
        });
        id
    }

    /// Remove a listener. Returns `false` if the id was not registered.
    pub fn unregister(&self, id: CallbackId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() < before
    }

    /// Invoke every listener with `value`.
    ///
    /// The listener list is copied out first so a listener may register,
    /// unregister, or trigger another notification without a borrow panic.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Rc<dyn Fn(&T)>> = self
            .listeners
            .borrow()
            .iter()
            .map(|listener| Rc::clone(&listener.callback))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn notifies_listeners_in_registration_order() {
        let callbacks: Callbacks<f64> = Callbacks::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        callbacks.register(move |level| seen_clone.borrow_mut().push(("slider", *level)));
        let seen_clone = seen.clone();
        callbacks.register(move |level| seen_clone.borrow_mut().push(("osd", *level)));

        callbacks.notify(&0.45);

        assert_eq!(*seen.borrow(), vec![("slider", 0.45), ("osd", 0.45)]);
    }

    #[test]
    fn unregister_stops_delivery() {
        let callbacks: Callbacks<f64> = Callbacks::new();
        let hits = Rc::new(Cell::new(0));

        let hits_clone = hits.clone();
        let id = callbacks.register(move |_| hits_clone.set(hits_clone.get() + 1));
        callbacks.notify(&1.0);
        assert_eq!(hits.get(), 1);

        assert!(callbacks.unregister(id));
        assert!(callbacks.is_empty());
        callbacks.notify(&1.0);
        assert_eq!(hits.get(), 1);

        // Second removal is reported as a miss.
        assert!(!callbacks.unregister(id));
    }

    #[test]
    fn listener_may_unregister_itself_during_notify() {
        let callbacks: Rc<Callbacks<f64>> = Rc::new(Callbacks::new());
        let own_id: Rc<Cell<Option<CallbackId>>> = Rc::new(Cell::new(None));

        let registry = Rc::downgrade(&callbacks);
        let own_id_clone = own_id.clone();
        let id = callbacks.register(move |_| {
            if let (Some(registry), Some(id)) = (registry.upgrade(), own_id_clone.get()) {
                registry.unregister(id);
            }
        });
        own_id.set(Some(id));

        callbacks.notify(&0.0);
        assert_eq!(callbacks.len(), 0);
    }

    #[test]
    fn ids_are_unique() {
        let callbacks: Callbacks<f64> = Callbacks::new();
        let a = callbacks.register(|_| {});
        let b = callbacks.register(|_| {});
        assert_ne!(a, b);
        assert_eq!(callbacks.len(), 2);
    }
}
