//! Boundary to the host's hardware brightness API.
//!
//! The host delivers brightness notifications to subscribers and accepts
//! programmatic writes. A write is itself reported back to every
//! subscriber, including the one that issued it.

use std::rc::{Rc, Weak};

use tracing::debug;

use crate::callbacks::{CallbackId, Callbacks};

/// A hardware brightness notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardwareEvent {
    /// Normalized backlight level; nominally in [0, 1].
    pub level: f64,
}

/// Host hardware brightness API.
pub trait HardwareBrightness {
    /// Start delivering notifications to `callback` until the returned
    /// subscription is released.
    fn subscribe(&self, callback: Box<dyn Fn(&HardwareEvent)>) -> Subscription;

    /// Set the hardware brightness. Subscribers receive the resulting
    /// notification like any other.
    fn write_brightness(&self, level: f64);
}

/// An active hardware notification subscription.
///
/// Released by `unsubscribe` or by dropping it.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Callbacks<HardwareEvent>>,
    id: CallbackId,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    pub fn id(&self) -> CallbackId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
            debug!("Hardware subscription {:?} released", self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Subscriber list for a hardware brightness source.
///
/// Implementations of `HardwareBrightness` own one and call `publish` for
/// every notification they observe.
#[derive(Default)]
pub struct BrightnessFeed {
    subscribers: Rc<Callbacks<HardwareEvent>>,
}

impl BrightnessFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&HardwareEvent) + 'static,
    {
        let id = self.subscribers.register(callback);
        debug!("Hardware subscription {:?} created", id);
        Subscription {
            registry: Rc::downgrade(&self.subscribers),
            id,
        }
    }

    pub fn publish(&self, level: f64) {
        self.subscribers.notify(&HardwareEvent { level });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
