//! DimmerController - the only writer of the virtual brightness.
//!
//! `apply` is total: any input, including NaN and values far outside the
//! unit interval, is mapped into [0, 1] and applied. A level of exactly
//! 1.0 removes the overlay; anything lower sets it.

use std::rc::Rc;

use tracing::debug;

use crate::callbacks::{CallbackId, Callbacks};
use crate::overlay::OverlayBackend;
use crate::state::{DimmerState, FULL_EPSILON, VIRTUAL_MAX, VIRTUAL_MIN};

/// Map any requested level onto [0, 1].
///
/// Values within `FULL_EPSILON` of either end snap to that end so stepped
/// arithmetic reaches 0.0 and 1.0 exactly. NaN means "no dimming".
pub fn clamp_level(requested: f64) -> f64 {
    if requested.is_nan() {
        return VIRTUAL_MAX;
    }
    let level = requested.clamp(VIRTUAL_MIN, VIRTUAL_MAX);
    if level >= VIRTUAL_MAX - FULL_EPSILON {
        VIRTUAL_MAX
    } else if level <= VIRTUAL_MIN + FULL_EPSILON {
        VIRTUAL_MIN
    } else {
        level
    }
}

pub struct DimmerController {
    state: Rc<DimmerState>,
    overlay: Rc<dyn OverlayBackend>,
    /// UI observers of the virtual brightness.
    observers: Callbacks<f64>,
}

impl DimmerController {
    pub fn new(state: Rc<DimmerState>, overlay: Rc<dyn OverlayBackend>) -> Self {
        Self {
            state,
            overlay,
            observers: Callbacks::new(),
        }
    }

    /// Apply a new virtual brightness and return the value actually stored.
    pub fn apply(&self, requested: f64) -> f64 {
        let level = clamp_level(requested);
        debug!("Setting dimmer brightness to {level:.3} (requested {requested})");

        self.state.store_virtual_brightness(level);
        self.observers.notify(&level);

        if level == VIRTUAL_MAX {
            self.overlay.clear();
        } else {
            self.overlay.set_level(level);
        }
        level
    }

    /// The last applied virtual brightness.
    pub fn current(&self) -> f64 {
        self.state.last_virtual_brightness()
    }

    /// Register a UI observer, called with the new level on every `apply`.
    pub fn observe<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(f64) + 'static,
    {
        self.observers.register(move |level: &f64| callback(*level))
    }

    pub fn unobserve(&self, id: CallbackId) -> bool {
        self.observers.unregister(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, Rig};
    use std::cell::RefCell;

    #[test]
    fn clamps_into_unit_interval() {
        let rig = Rig::new();

        assert_eq!(rig.controller.apply(-5.0), 0.0);
        assert_eq!(rig.state.last_virtual_brightness(), 0.0);

        assert_eq!(rig.controller.apply(5.0), 1.0);
        assert_eq!(rig.state.last_virtual_brightness(), 1.0);

        assert_eq!(rig.controller.apply(0.3), 0.3);
        assert_eq!(rig.controller.current(), 0.3);
    }

    #[test]
    fn clamping_is_total() {
        assert_eq!(clamp_level(f64::INFINITY), 1.0);
        assert_eq!(clamp_level(f64::NEG_INFINITY), 0.0);
        assert_eq!(clamp_level(f64::MAX), 1.0);
        assert_eq!(clamp_level(f64::NAN), 1.0);
    }

    #[test]
    fn snaps_near_range_ends() {
        assert_eq!(clamp_level(1.0 - 1e-9), 1.0);
        assert_eq!(clamp_level(1e-12), 0.0);
        assert_eq!(clamp_level(0.95), 0.95);
    }

    #[test]
    fn full_level_clears_overlay() {
        let rig = Rig::new();
        rig.controller.apply(1.0);
        assert_eq!(rig.calls(), vec![Call::Clear]);
    }

    #[test]
    fn partial_level_sets_overlay() {
        let rig = Rig::new();
        rig.controller.apply(0.5);
        assert_eq!(rig.calls(), vec![Call::SetLevel(0.5)]);
    }

    #[test]
    fn observers_see_every_applied_value() {
        let rig = Rig::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        let id = rig
            .controller
            .observe(move |level| seen_clone.borrow_mut().push(level));

        rig.controller.apply(0.4);
        rig.controller.apply(7.0);
        assert!(rig.controller.unobserve(id));
        rig.controller.apply(0.2);

        assert_eq!(*seen.borrow(), vec![0.4, 1.0]);
    }
}
