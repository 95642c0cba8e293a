//! Core types, state machine, and backends for the dimmer.
//!
//! This crate provides:
//! - The brightness reconciliation state machine that turns backlight
//!   button presses at the hardware floor into virtual dimming steps
//! - The dimming controller and the overlay backend it drives
//! - Configuration parsing from TOML
//! - Logging setup
//! - Persisted preferences

pub mod callbacks;
pub mod config;
pub mod controller;
pub mod dimmer;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod notify;
pub mod overlay;
pub mod preference;
pub mod reconciler;
pub mod shortcut;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{Config, ConfigLoadResult, DEFAULT_CONFIG_TOML};
pub use controller::DimmerController;
pub use dimmer::{Collaborators, Dimmer};
pub use error::{Error, Result};
pub use hardware::{BrightnessFeed, HardwareBrightness, HardwareEvent, Subscription};
pub use notify::{DimmingToast, Notifier, Toast};
pub use overlay::{OverlayBackend, OverlayDriver};
pub use preference::PreferenceStore;
pub use reconciler::BrightnessReconciler;
pub use shortcut::ShortcutSubscriptionManager;
pub use state::{DimmerSnapshot, DimmerState};
