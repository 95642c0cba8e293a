//! Shared dimmer state.
//!
//! One `DimmerState` lives from activation to deactivation and is shared by
//! `Rc` between the controller and the reconciler. All access happens on the
//! main loop thread, so plain `Cell`s are enough.

use std::cell::Cell;

/// Virtual brightness meaning "no dimming".
pub const VIRTUAL_MAX: f64 = 1.0;

/// Virtual brightness meaning "fully dimmed".
pub const VIRTUAL_MIN: f64 = 0.0;

/// Tolerance for deciding a virtual brightness sits on an end of the range.
///
/// Repeated additions of a step such as 0.05 drift away from exact decimal
/// values, so range ends are compared with this tolerance.
pub const FULL_EPSILON: f64 = 1e-6;

/// Whether a virtual brightness means the overlay is disabled.
pub fn is_fully_open(level: f64) -> bool {
    level >= VIRTUAL_MAX - FULL_EPSILON
}

/// Copy of the state for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimmerSnapshot {
    pub last_hardware_brightness: f64,
    pub last_virtual_brightness: f64,
    pub self_echo: bool,
}

impl Default for DimmerSnapshot {
    fn default() -> Self {
        Self {
            last_hardware_brightness: 0.0,
            last_virtual_brightness: VIRTUAL_MAX,
            self_echo: false,
        }
    }
}

#[derive(Debug)]
pub struct DimmerState {
    /// Hardware level reported by the previous notification.
    last_hardware_brightness: Cell<f64>,
    /// Last value stored by `DimmerController::apply`.
    last_virtual_brightness: Cell<f64>,
    /// Set between our own force-to-floor write and the echo it produces.
    self_echo: Cell<bool>,
}

impl DimmerState {
    pub fn new() -> Self {
        let initial = DimmerSnapshot::default();
        Self {
            last_hardware_brightness: Cell::new(initial.last_hardware_brightness),
            last_virtual_brightness: Cell::new(initial.last_virtual_brightness),
            self_echo: Cell::new(initial.self_echo),
        }
    }

    pub fn last_hardware_brightness(&self) -> f64 {
        self.last_hardware_brightness.get()
    }

    pub fn last_virtual_brightness(&self) -> f64 {
        self.last_virtual_brightness.get()
    }

    pub fn self_echo(&self) -> bool {
        self.self_echo.get()
    }

    pub fn snapshot(&self) -> DimmerSnapshot {
        DimmerSnapshot {
            last_hardware_brightness: self.last_hardware_brightness(),
            last_virtual_brightness: self.last_virtual_brightness(),
            self_echo: self.self_echo(),
        }
    }

    /// Return to the values held right after activation.
    pub fn reset(&self) {
        let initial = DimmerSnapshot::default();
        self.last_hardware_brightness
            .set(initial.last_hardware_brightness);
        self.last_virtual_brightness
            .set(initial.last_virtual_brightness);
        self.self_echo.set(initial.self_echo);
    }

    pub(crate) fn record_hardware_brightness(&self, level: f64) {
        self.last_hardware_brightness.set(level);
    }

    pub(crate) fn store_virtual_brightness(&self, level: f64) {
        self.last_virtual_brightness.set(level);
    }

    pub(crate) fn arm_self_echo(&self) {
        self.self_echo.set(true);
    }

    /// Clear the echo flag, returning whether it was set.
    pub(crate) fn take_self_echo(&self) -> bool {
        self.self_echo.replace(false)
    }
}

impl Default for DimmerState {
    fn default() -> Self {
        Self::new()
    }
}
