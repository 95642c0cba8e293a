//! Host integrations for the daemon: backlight, notifications, control IPC.

pub mod backlight;
pub mod ipc;
pub mod notifications;

pub use backlight::BacklightService;
pub use ipc::{ControlListener, ControlMessage};
pub use notifications::DesktopNotifier;
