//! Transient user notifications ("toasts").

use std::time::Duration;

/// Title shared by all dimmer toasts.
pub const TOAST_TITLE: &str = "Dimmer Brightness";

/// Why a toast is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimmingToast {
    /// Dimming engaged for the first time from fully open.
    On,
    /// Dimming stepped back up to fully open.
    Off,
}

impl DimmingToast {
    pub fn body(&self) -> &'static str {
        match self {
            DimmingToast::On => "ON",
            DimmingToast::Off => "OFF",
        }
    }
}

/// A time-boxed, auto-dismissing notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub kind: DimmingToast,
    pub title: &'static str,
    pub body: &'static str,
    pub duration: Duration,
}

impl Toast {
    pub fn dimming(kind: DimmingToast, duration: Duration) -> Self {
        Self {
            kind,
            title: TOAST_TITLE,
            body: kind.body(),
            duration,
        }
    }
}

/// Shows toasts. Fire-and-forget.
pub trait Notifier {
    fn toast(&self, toast: &Toast);
}
