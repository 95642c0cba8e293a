//! ShortcutSubscriptionManager - toggles whether backlight buttons drive
//! the dimmer.
//!
//! Enabling subscribes the reconciler to hardware notifications; disabling
//! releases that subscription. Both directions are idempotent, so there is
//! never more than one live subscription. Every `set_enabled` call stores
//! the requested state under `shortcut-control-enabled`.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::hardware::{HardwareBrightness, Subscription};
use crate::preference::{self, PreferenceStore};
use crate::reconciler::BrightnessReconciler;

/// Preference key for the shortcut toggle.
pub const SHORTCUT_PREFERENCE_KEY: &str = "shortcut-control-enabled";

pub struct ShortcutSubscriptionManager {
    hardware: Rc<dyn HardwareBrightness>,
    reconciler: Rc<BrightnessReconciler>,
    store: Rc<dyn PreferenceStore>,
    /// Present iff shortcut control is enabled.
    subscription: RefCell<Option<Subscription>>,
}

impl ShortcutSubscriptionManager {
    pub fn new(
        hardware: Rc<dyn HardwareBrightness>,
        reconciler: Rc<BrightnessReconciler>,
        store: Rc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            hardware,
            reconciler,
            store,
            subscription: RefCell::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    /// Turn shortcut control on or off and persist the choice.
    pub fn set_enabled(&self, enabled: bool) {
        self.switch(enabled);
        preference::set_flag(self.store.as_ref(), SHORTCUT_PREFERENCE_KEY, enabled);
    }

    /// Apply the persisted preference (default off) without rewriting it.
    pub fn restore(&self) -> bool {
        let enabled = preference::get_flag(self.store.as_ref(), SHORTCUT_PREFERENCE_KEY);
        debug!("Restoring shortcut control: {enabled}");
        self.switch(enabled);
        enabled
    }

    /// Drop the subscription but keep the persisted preference, so the
    /// next activation restores it.
    pub fn release(&self) {
        self.switch(false);
    }

    fn switch(&self, enabled: bool) {
        if enabled && !self.is_enabled() {
            let reconciler = Rc::downgrade(&self.reconciler);
            let subscription = self.hardware.subscribe(Box::new(move |event| {
                if let Some(reconciler) = reconciler.upgrade() {
                    reconciler.on_hardware_brightness_changed(event.level);
                }
            }));
            *self.subscription.borrow_mut() = Some(subscription);
            info!("Shortcut control enabled");
        } else if !enabled {
            let released = self.subscription.borrow_mut().take();
            if let Some(subscription) = released {
                subscription.unsubscribe();
                info!("Shortcut control disabled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preference::MemoryStore;
    use crate::test_support::Rig;

    fn stored(rig: &Rig) -> Option<String> {
        rig.store.get(SHORTCUT_PREFERENCE_KEY)
    }

    #[test]
    fn enabling_twice_subscribes_once() {
        let rig = Rig::new();
        let manager = rig.shortcut_manager();

        manager.set_enabled(true);
        assert_eq!(rig.hardware.subscriber_count(), 1);
        assert_eq!(stored(&rig).as_deref(), Some("true"));

        manager.set_enabled(true);
        assert_eq!(rig.hardware.subscriber_count(), 1);
        assert_eq!(stored(&rig).as_deref(), Some("true"));
        assert!(manager.is_enabled());

        manager.set_enabled(false);
        assert_eq!(rig.hardware.subscriber_count(), 0);
        assert_eq!(stored(&rig).as_deref(), Some("false"));
        assert!(!manager.is_enabled());
    }

    #[test]
    fn disabling_when_disabled_still_persists() {
        let rig = Rig::new();
        let manager = rig.shortcut_manager();

        manager.set_enabled(false);
        manager.set_enabled(false);

        assert_eq!(rig.hardware.subscriber_count(), 0);
        assert_eq!(stored(&rig).as_deref(), Some("false"));
        assert_eq!(rig.store.writes(), 2);
    }

    #[test]
    fn subscription_feeds_the_reconciler() {
        let rig = Rig::new();
        let manager = rig.shortcut_manager();

        rig.hardware.press(0.0);
        assert_eq!(rig.state.last_virtual_brightness(), 1.0);

        manager.set_enabled(true);
        rig.hardware.press(0.0);
        assert!(rig.state.last_virtual_brightness() < 1.0);

        manager.set_enabled(false);
        let before = rig.state.last_virtual_brightness();
        rig.hardware.press(0.0);
        assert_eq!(rig.state.last_virtual_brightness(), before);
    }

    #[test]
    fn restore_follows_stored_value() {
        let rig = Rig::with_store(MemoryStore::with(SHORTCUT_PREFERENCE_KEY, "true"));
        let manager = rig.shortcut_manager();

        assert!(manager.restore());
        assert!(manager.is_enabled());
        assert_eq!(rig.store.writes(), 0);

        let rig = Rig::new();
        let manager = rig.shortcut_manager();
        assert!(!manager.restore());
        assert_eq!(rig.hardware.subscriber_count(), 0);
    }

    #[test]
    fn release_keeps_preference() {
        let rig = Rig::new();
        let manager = rig.shortcut_manager();
        manager.set_enabled(true);

        manager.release();

        assert!(!manager.is_enabled());
        assert_eq!(rig.hardware.subscriber_count(), 0);
        assert_eq!(stored(&rig).as_deref(), Some("true"));
    }
}
