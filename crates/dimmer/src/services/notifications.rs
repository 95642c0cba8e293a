//! Desktop notifications for dimming ON/OFF toasts.
//!
//! Sends `org.freedesktop.Notifications.Notify` on the session bus. Each
//! toast replaces the previous one so rapid presses never stack up.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use dimmer_core::{DimmingToast, Notifier, Toast};
use gio::prelude::*;
use tracing::{debug, warn};

const NOTIFICATIONS_BUS_NAME: &str = "org.freedesktop.Notifications";
const NOTIFICATIONS_PATH: &str = "/org/freedesktop/Notifications";
const NOTIFICATIONS_INTERFACE: &str = "org.freedesktop.Notifications";

const APP_NAME: &str = "dimmer";

/// Freedesktop icon name for a toast.
pub fn icon_name(kind: DimmingToast) -> &'static str {
    match kind {
        DimmingToast::On => "weather-clear-night",
        DimmingToast::Off => "weather-clear",
    }
}

/// `expire_timeout` argument in milliseconds.
fn expire_timeout(toast: &Toast) -> i32 {
    i32::try_from(toast.duration.as_millis()).unwrap_or(i32::MAX)
}

pub struct DesktopNotifier {
    connection: RefCell<Option<gio::DBusConnection>>,
    /// Id of the last notification shown, replaced by the next one.
    last_id: Rc<Cell<u32>>,
}

impl DesktopNotifier {
    pub fn new() -> Rc<Self> {
        let connection = match gio::bus_get_sync(gio::BusType::Session, None::<&gio::Cancellable>)
        {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("DesktopNotifier: failed to connect to session bus: {e}; toasts disabled");
                None
            }
        };

        Rc::new(Self {
            connection: RefCell::new(connection),
            last_id: Rc::new(Cell::new(0)),
        })
    }
}

impl Notifier for DesktopNotifier {
    fn toast(&self, toast: &Toast) {
        let Some(connection) = self.connection.borrow().clone() else {
            debug!("DesktopNotifier: no session bus; dropping toast {:?}", toast.kind);
            return;
        };

        let mut hints: HashMap<String, glib::Variant> = HashMap::new();
        hints.insert("transient".to_string(), true.to_variant());

        let params = (
            APP_NAME,
            self.last_id.get(),
            icon_name(toast.kind),
            toast.title,
            toast.body,
            Vec::<String>::new(),
            hints,
            expire_timeout(toast),
        )
            .to_variant();

        let last_id = self.last_id.clone();
        connection.call(
            Some(NOTIFICATIONS_BUS_NAME),
            NOTIFICATIONS_PATH,
            NOTIFICATIONS_INTERFACE,
            "Notify",
            Some(&params),
            glib::VariantTy::new("(u)").ok(),
            gio::DBusCallFlags::NONE,
            -1,
            None::<&gio::Cancellable>,
            move |res| match res {
                Ok(reply) => {
                    if let Some(id) = reply.child_value(0).get::<u32>() {
                        last_id.set(id);
                    }
                }
                Err(e) => warn!("DesktopNotifier: Notify failed: {e}"),
            },
        );
    }
}
