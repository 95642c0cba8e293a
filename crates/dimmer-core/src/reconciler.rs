//! BrightnessReconciler - maps backlight button presses at the hardware
//! floor onto the virtual brightness axis.
//!
//! While the backlight has headroom, notifications are only recorded. Once
//! the previous reading sits at the floor (`<= 0`):
//! - a rise off the floor is a "brighter" press: the backlight is forced
//!   back to 0 and the virtual brightness steps up,
//! - a reading at the floor is a "darker" press: the virtual brightness
//!   steps down.
//!
//! Forcing the backlight to 0 produces a notification of its own. The
//! `self_echo` flag marks that one write so its echo is absorbed instead of
//! being read as a "darker" press that leaves the user one step darker
//! than intended.
//!
//! Notifications are handled strictly one at a time. A host that reports
//! our own write synchronously from inside `write_brightness` re-enters
//! `on_hardware_brightness_changed`; such nested notifications are queued
//! and handled after the current one, in delivery order.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::DimmerConfig;
use crate::controller::DimmerController;
use crate::hardware::HardwareBrightness;
use crate::notify::{DimmingToast, Notifier, Toast};
use crate::state::{DimmerState, is_fully_open};

/// Virtual brightness change per button press.
pub const DIMMER_STEP: f64 = 0.05;

/// How long the ON/OFF toast stays visible.
pub const TOAST_TIMEOUT: Duration = Duration::from_millis(1000);

/// Tunables for the reconciler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcilerSettings {
    pub step: f64,
    pub toast_duration: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            step: DIMMER_STEP,
            toast_duration: TOAST_TIMEOUT,
        }
    }
}

impl From<&DimmerConfig> for ReconcilerSettings {
    fn from(config: &DimmerConfig) -> Self {
        Self {
            step: config.step,
            toast_duration: config.toast_duration(),
        }
    }
}

pub struct BrightnessReconciler {
    state: Rc<DimmerState>,
    controller: Rc<DimmerController>,
    hardware: Rc<dyn HardwareBrightness>,
    notifier: Rc<dyn Notifier>,
    settings: ReconcilerSettings,
    /// Whether a notification is being handled right now.
    dispatching: Cell<bool>,
    /// Notifications delivered while `dispatching`.
    queued: RefCell<VecDeque<f64>>,
}

impl BrightnessReconciler {
    pub fn new(
        state: Rc<DimmerState>,
        controller: Rc<DimmerController>,
        hardware: Rc<dyn HardwareBrightness>,
        notifier: Rc<dyn Notifier>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            state,
            controller,
            hardware,
            notifier,
            settings,
            dispatching: Cell::new(false),
            queued: RefCell::new(VecDeque::new()),
        }
    }

    pub fn settings(&self) -> ReconcilerSettings {
        self.settings
    }

    /// Handle one hardware brightness notification.
    pub fn on_hardware_brightness_changed(&self, reported: f64) {
        if self.dispatching.get() {
            trace!("Queueing nested brightness notification {reported}");
            self.queued.borrow_mut().push_back(reported);
            return;
        }

        self.dispatching.set(true);
        self.handle(reported);
        loop {
            let next = self.queued.borrow_mut().pop_front();
            match next {
                Some(level) => self.handle(level),
                None => break,
            }
        }
        self.dispatching.set(false);
    }

    fn handle(&self, reported: f64) {
        debug!("Brightness changed to {reported}");

        if reported <= 0.0 && self.state.take_self_echo() {
            // Our own force-to-floor write coming back. The flag is checked
            // before the floor test: the press that caused the write left
            // the recorded level above the floor.
            debug!("Absorbed brightness echo");
        } else if self.state.last_hardware_brightness() <= 0.0 {
            if reported > 0.0 {
                self.step_up();
            } else {
                self.step_down();
            }
        }

        self.state.record_hardware_brightness(reported);
        trace!("Dimmer state: {:?}", self.state.snapshot());
    }

    fn step_up(&self) {
        let current = self.state.last_virtual_brightness();
        if is_fully_open(current) {
            // Nothing left to brighten virtually; let the backlight rise.
            return;
        }

        self.state.arm_self_echo();
        self.hardware.write_brightness(0.0);

        let applied = self.controller.apply(current + self.settings.step);
        if is_fully_open(applied) {
            self.toast(DimmingToast::Off);
        }
    }

    fn step_down(&self) {
        let current = self.state.last_virtual_brightness();
        if is_fully_open(current) {
            self.toast(DimmingToast::On);
        }
        self.controller.apply(current - self.settings.step);
    }

    fn toast(&self, kind: DimmingToast) {
        self.notifier
            .toast(&Toast::dimming(kind, self.settings.toast_duration));
    }
}
