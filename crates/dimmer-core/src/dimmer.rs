//! Dimmer lifecycle: wires the state, controller, reconciler and shortcut
//! manager to their collaborators.
//!
//! `activate` prepares the overlay backend and restores the persisted
//! shortcut preference. `deactivate` stops listening to the backlight and
//! removes any dimming; the preference is left untouched.

use std::cell::Cell;
use std::rc::Rc;

use tracing::info;

use crate::callbacks::CallbackId;
use crate::config::DimmerConfig;
use crate::controller::DimmerController;
use crate::hardware::HardwareBrightness;
use crate::notify::Notifier;
use crate::overlay::OverlayBackend;
use crate::preference::PreferenceStore;
use crate::reconciler::{BrightnessReconciler, ReconcilerSettings};
use crate::shortcut::ShortcutSubscriptionManager;
use crate::state::{DimmerSnapshot, DimmerState};

/// External systems the dimmer talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub hardware: Rc<dyn HardwareBrightness>,
    pub overlay: Rc<dyn OverlayBackend>,
    pub notifier: Rc<dyn Notifier>,
    pub store: Rc<dyn PreferenceStore>,
}

pub struct Dimmer {
    state: Rc<DimmerState>,
    controller: Rc<DimmerController>,
    reconciler: Rc<BrightnessReconciler>,
    shortcut: ShortcutSubscriptionManager,
    overlay: Rc<dyn OverlayBackend>,
    active: Cell<bool>,
}

impl Dimmer {
    pub fn activate(config: &DimmerConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            hardware,
            overlay,
            notifier,
            store,
        } = collaborators;

        overlay.activate();

        let state = Rc::new(DimmerState::new());
        let controller = Rc::new(DimmerController::new(state.clone(), overlay.clone()));
        let reconciler = Rc::new(BrightnessReconciler::new(
            state.clone(),
            controller.clone(),
            hardware.clone(),
            notifier,
            ReconcilerSettings::from(config),
        ));
        let shortcut = ShortcutSubscriptionManager::new(hardware, reconciler.clone(), store);
        shortcut.restore();

        info!(
            "Dimmer activated (step {}, shortcut control {})",
            config.step,
            if shortcut.is_enabled() { "on" } else { "off" }
        );

        Self {
            state,
            controller,
            reconciler,
            shortcut,
            overlay,
            active: Cell::new(true),
        }
    }

    pub fn controller(&self) -> &Rc<DimmerController> {
        &self.controller
    }

    pub fn reconciler(&self) -> &Rc<BrightnessReconciler> {
        &self.reconciler
    }

    pub fn snapshot(&self) -> DimmerSnapshot {
        self.state.snapshot()
    }

    /// Set the virtual brightness directly (the slider).
    pub fn set_brightness(&self, level: f64) -> f64 {
        self.controller.apply(level)
    }

    pub fn set_shortcut_control(&self, enabled: bool) {
        self.shortcut.set_enabled(enabled);
    }

    pub fn shortcut_control_enabled(&self) -> bool {
        self.shortcut.is_enabled()
    }

    pub fn observe<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(f64) + 'static,
    {
        self.controller.observe(callback)
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stop reacting to the backlight and remove dimming. Idempotent.
    pub fn deactivate(&self) {
        if !self.active.replace(false) {
            return;
        }
        self.shortcut.release();
        self.overlay.clear();
        self.state.reset();
        info!("Dimmer deactivated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preference::MemoryStore;
    use crate::shortcut::SHORTCUT_PREFERENCE_KEY;
    use crate::test_support::{Call, Rig};

    #[test]
    fn activation_prepares_overlay_and_restores_shortcut() {
        let rig = Rig::with_store(MemoryStore::with(SHORTCUT_PREFERENCE_KEY, "true"));
        let dimmer = Dimmer::activate(&DimmerConfig::default(), rig.collaborators());

        assert_eq!(rig.calls(), vec![Call::Activate]);
        assert!(dimmer.shortcut_control_enabled());
        assert_eq!(rig.hardware.subscriber_count(), 1);
        assert_eq!(dimmer.snapshot(), DimmerSnapshot::default());
    }

    #[test]
    fn shortcut_defaults_off() {
        let rig = Rig::new();
        let dimmer = Dimmer::activate(&DimmerConfig::default(), rig.collaborators());

        assert!(!dimmer.shortcut_control_enabled());
        assert_eq!(rig.hardware.subscriber_count(), 0);
    }

    #[test]
    fn button_presses_drive_overlay_end_to_end() {
        let rig = Rig::new();
        rig.hardware.set_synchronous_echo(true);
        let dimmer = Dimmer::activate(&DimmerConfig::default(), rig.collaborators());
        dimmer.set_shortcut_control(true);
        rig.clear_calls();

        // Down twice at the floor, then up once.
        rig.hardware.press(0.0);
        rig.hardware.press(0.0);
        rig.hardware.press(0.2);

        let levels: Vec<f64> = rig
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SetLevel(level) => Some(level),
                _ => None,
            })
            .collect();
        assert_eq!(levels.len(), 3);
        assert!((levels[2] - 0.95).abs() < 1e-9);
        assert_eq!(rig.hardware.writes(), vec![0.0]);
        assert!(!dimmer.snapshot().self_echo);
    }

    #[test]
    fn slider_notifies_observers() {
        let rig = Rig::new();
        let dimmer = Dimmer::activate(&DimmerConfig::default(), rig.collaborators());
        let seen = Rc::new(Cell::new(f64::NAN));

        let seen_clone = seen.clone();
        dimmer.observe(move |level| seen_clone.set(level));
        dimmer.set_brightness(0.3);

        assert_eq!(seen.get(), 0.3);
        assert_eq!(dimmer.controller().current(), 0.3);
    }

    #[test]
    fn deactivate_releases_and_clears_once() {
        let rig = Rig::new();
        let dimmer = Dimmer::activate(&DimmerConfig::default(), rig.collaborators());
        dimmer.set_shortcut_control(true);
        dimmer.set_brightness(0.4);
        rig.clear_calls();

        dimmer.deactivate();
        dimmer.deactivate();

        assert_eq!(rig.calls(), vec![Call::Clear]);
        assert_eq!(rig.hardware.subscriber_count(), 0);
        assert!(!dimmer.is_active());
        assert_eq!(dimmer.snapshot(), DimmerSnapshot::default());
        assert_eq!(
            rig.store.get(SHORTCUT_PREFERENCE_KEY).as_deref(),
            Some("true")
        );
    }
}
