//! The long-running dimmer daemon.
//!
//! Everything runs on one GLib main loop: udev backlight events, control
//! socket messages and signal handling. Only the overlay backend has its
//! own thread.

use std::rc::Rc;

use dimmer_core::overlay::{GamescopeOverlay, OverlayWorker};
use dimmer_core::preference::{self, StateFile};
use dimmer_core::{Collaborators, Config, Dimmer};
use tracing::{debug, info, warn};

use crate::services::{BacklightService, ControlListener, ControlMessage, DesktopNotifier};

/// Apply one control message.
fn dispatch(dimmer: &Dimmer, msg: ControlMessage) {
    match msg {
        ControlMessage::SetBrightness(level) => {
            dimmer.set_brightness(level);
        }
        ControlMessage::Reset => {
            dimmer.set_brightness(1.0);
        }
        ControlMessage::Shortcut(enabled) => dimmer.set_shortcut_control(enabled),
    }
}

pub fn run(config: &Config) -> dimmer_core::Result<()> {
    let main_loop = glib::MainLoop::new(None, false);

    let backlight = BacklightService::new(&config.backlight);
    let overlay = Rc::new(OverlayWorker::spawn(GamescopeOverlay::new(&config.overlay))?);
    let state_path = config
        .dimmer
        .state_file
        .clone()
        .unwrap_or_else(preference::default_state_path);
    let store = Rc::new(StateFile::open(state_path));

    let dimmer = Rc::new(Dimmer::activate(
        &config.dimmer,
        Collaborators {
            hardware: backlight.clone(),
            overlay: overlay.clone(),
            notifier: DesktopNotifier::new(),
            store,
        },
    ));
    dimmer.observe(|level| debug!("Dimmer brightness now {level:.2}"));

    let listener = ControlListener::new();
    match &listener {
        Some(listener) => {
            let dimmer_weak = Rc::downgrade(&dimmer);
            listener.borrow().connect(move |msg| {
                if let Some(dimmer) = dimmer_weak.upgrade() {
                    dispatch(&dimmer, msg);
                }
            });
        }
        None => warn!("Control socket unavailable; `dimmer set` and friends will not reach this daemon"),
    }

    for signal in [libc::SIGINT, libc::SIGTERM] {
        let main_loop = main_loop.clone();
        glib::unix_signal_add_local(signal, move || {
            info!("Received signal {signal}, shutting down");
            main_loop.quit();
            glib::ControlFlow::Continue
        });
    }

    info!(
        "dimmer running (backlight: {})",
        backlight.device_name().unwrap_or("none")
    );
    main_loop.run();

    drop(listener);
    dimmer.deactivate();
    drop(dimmer);
    // Last reference: joins the overlay thread after it clears the overlay.
    drop(overlay);
    Ok(())
}
