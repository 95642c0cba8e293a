//! Overlay backend that darkens the screen below the backlight floor.
//!
//! Two layers:
//! - `OverlayBackend` is what the controller talks to. Calls are
//!   fire-and-forget: nothing is returned and failures never reach the
//!   state machine.
//! - `OverlayDriver` is a concrete, fallible implementation such as
//!   `GamescopeOverlay`. `OverlayWorker` runs a driver on a background
//!   thread and adapts it to `OverlayBackend`.

pub mod gamescope;
pub mod lut;
pub mod worker;

pub use gamescope::GamescopeOverlay;
pub use worker::{OverlayCommand, OverlayWorker};

use crate::error::Result;

/// Fire-and-forget overlay operations used by `DimmerController`.
pub trait OverlayBackend {
    /// One-time preparation when the dimmer is activated.
    fn activate(&self);

    /// Dim the screen so the displayed level equals `level` (0 < level < 1).
    fn set_level(&self, level: f64);

    /// Remove dimming entirely.
    fn clear(&self);
}

/// A blocking overlay implementation driven from the worker thread.
pub trait OverlayDriver: Send + 'static {
    fn activate(&mut self) -> Result<()>;

    fn set_level(&mut self, level: f64) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    /// Undo any applied overlay before the worker exits.
    fn shutdown(&mut self) -> Result<()>;
}
