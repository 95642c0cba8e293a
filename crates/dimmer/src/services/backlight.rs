//! BacklightService - the host hardware brightness API.
//!
//! - Discovers a backlight device in `/sys/class/backlight`
//! - Reports every udev `change` event on that device to subscribers as a
//!   normalized level, via the GLib main loop
//! - Writes through systemd-logind (`Session.SetBrightness`), falling back
//!   to direct sysfs writes if logind is unavailable
//!
//! Every change event is reported, including ones that repeat the previous
//! value: a button press at the floor shows up only as a repeated 0. Events
//! carry no value, so each report reads the current sysfs value. While our
//! own write is still unreported, a burst of events is reported once.

use std::cell::{Cell, RefCell};
use std::fs;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use dimmer_core::config::BacklightConfig;
use dimmer_core::{BrightnessFeed, HardwareBrightness, HardwareEvent, Subscription};
use gio::prelude::*;
use tracing::{debug, error, info, warn};

/// Logind D-Bus constants.
const LOGIND_BUS_NAME: &str = "org.freedesktop.login1";
const LOGIND_MANAGER_PATH: &str = "/org/freedesktop/login1";
const LOGIND_MANAGER_INTERFACE: &str = "org.freedesktop.login1.Manager";
const LOGIND_SESSION_INTERFACE: &str = "org.freedesktop.login1.Session";

/// Path to the backlight class on Linux.
const BACKLIGHT_PATH: &str = "/sys/class/backlight";

/// Convert a raw backlight value to a level in [0, 1].
///
/// Raw values at or below `min_raw` are the floor.
pub fn raw_to_level(raw: u32, min_raw: u32, max_raw: u32) -> f64 {
    if max_raw <= min_raw {
        return 0.0;
    }
    let span = (max_raw - min_raw) as f64;
    (raw.saturating_sub(min_raw) as f64 / span).clamp(0.0, 1.0)
}

/// Convert a level to the raw value written to the device.
pub fn level_to_raw(level: f64, min_raw: u32, max_raw: u32) -> u32 {
    if max_raw <= min_raw || level.is_nan() {
        return min_raw.min(max_raw);
    }
    let span = (max_raw - min_raw) as f64;
    min_raw + (level.clamp(0.0, 1.0) * span).round() as u32
}

/// Number of notifications to publish for `changes` drained change events.
///
/// All of them read the same sysfs value, so while our own write is pending
/// a burst cannot tell its echo apart from a press.
pub fn notifications_for(changes: usize, own_write_pending: bool) -> usize {
    if own_write_pending {
        changes.min(1)
    } else {
        changes
    }
}

/// The selected backlight device.
struct BacklightDevice {
    /// Directory name under /sys/class/backlight.
    name: String,
    brightness_path: PathBuf,
    max_brightness_raw: u32,
}

pub struct BacklightService {
    device: Option<BacklightDevice>,
    /// Raw value treated as the floor.
    min_raw: u32,
    /// Logind session object path; None falls back to sysfs.
    logind_session_path: RefCell<Option<String>>,
    dbus_connection: RefCell<Option<gio::DBusConnection>>,
    /// Subscribers to brightness notifications.
    feed: BrightnessFeed,
    /// A write went out and no change event has been seen since.
    own_write_pending: Cell<bool>,
    /// Udev monitor socket (must stay alive while monitoring).
    udev_monitor: RefCell<Option<udev::MonitorSocket>>,
    /// GLib source ID for the udev fd watcher.
    udev_source_id: RefCell<Option<glib::SourceId>>,
}

impl BacklightService {
    pub fn new(config: &BacklightConfig) -> Rc<Self> {
        let service = Rc::new(Self {
            device: Self::discover_backlight(
                Path::new(BACKLIGHT_PATH),
                config.device.as_deref(),
                config.min_raw,
            ),
            min_raw: config.min_raw,
            logind_session_path: RefCell::new(None),
            dbus_connection: RefCell::new(None),
            feed: BrightnessFeed::new(),
            own_write_pending: Cell::new(false),
            udev_monitor: RefCell::new(None),
            udev_source_id: RefCell::new(None),
        });

        if let Some(device) = &service.device {
            Self::init_logind(&service);
            service.start_udev_monitoring();
            info!(
                "BacklightService: using {} (level {:?})",
                device.name,
                service.level()
            );
        } else {
            warn!("BacklightService: no backlight device found; shortcut control disabled");
        }

        service
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.name.as_str())
    }

    /// Current normalized level, if a device is available and readable.
    pub fn level(&self) -> Option<f64> {
        let device = self.device.as_ref()?;
        let raw = read_u32_from_file(&device.brightness_path)?;
        Some(raw_to_level(raw, self.min_raw, device.max_brightness_raw))
    }

    /// Pick a backlight device: the configured one, else the first usable
    /// device by vendor priority (amd, intel, acpi, others).
    ///
    /// A device whose `max_brightness` is not above `min_raw` would read as
    /// the floor forever and is skipped.
    fn discover_backlight(
        root: &Path,
        preferred: Option<&str>,
        min_raw: u32,
    ) -> Option<BacklightDevice> {
        let entries = match fs::read_dir(root) {
            Ok(it) => it,
            Err(err) => {
                debug!("BacklightService: failed to read {}: {err}", root.display());
                return None;
            }
        };

        let mut devices: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_dir())
            .collect();

        if let Some(name) = preferred {
            devices.retain(|p| p.file_name().and_then(|n| n.to_str()) == Some(name));
            if devices.is_empty() {
                warn!("BacklightService: configured device {name} not found");
                return None;
            }
        }

        devices.sort_by_key(|p| {
            let name = p
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_lowercase();
            let rank = if name.contains("amd") {
                0
            } else if name.contains("intel") {
                1
            } else if name.contains("acpi") {
                2
            } else {
                3
            };
            (rank, name)
        });

        devices.into_iter().find_map(|device| {
            let name = device.file_name()?.to_str()?.to_string();
            let brightness_path = device.join("brightness");
            let max = read_u32_from_file(&device.join("max_brightness"));
            match max {
                Some(max_brightness_raw) if max_brightness_raw <= min_raw => {
                    warn!(
                        "BacklightService: skipping {name}: min_raw {min_raw} is not below max_brightness {max_brightness_raw}"
                    );
                    None
                }
                Some(max_brightness_raw) if max_brightness_raw > 0 && brightness_path.exists() => {
                    Some(BacklightDevice {
                        name,
                        brightness_path,
                        max_brightness_raw,
                    })
                }
                _ => {
                    debug!("BacklightService: skipping unusable device {name}");
                    None
                }
            }
        })
    }

    /// Connect to the system bus and find our logind session.
    fn init_logind(this: &Rc<Self>) {
        let this_weak = Rc::downgrade(this);

        gio::bus_get(
            gio::BusType::System,
            None::<&gio::Cancellable>,
            move |res| {
                let Some(this) = this_weak.upgrade() else {
                    return;
                };

                let connection = match res {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(
                            "BacklightService: failed to connect to system bus: {}; \
                             falling back to direct sysfs writes",
                            e
                        );
                        return;
                    }
                };

                match find_logind_session(&connection) {
                    Some(session_path) => {
                        debug!("BacklightService: using logind session {}", session_path);
                        *this.logind_session_path.borrow_mut() = Some(session_path);
                        *this.dbus_connection.borrow_mut() = Some(connection);
                    }
                    None => warn!(
                        "BacklightService: no usable logind session found; \
                         falling back to direct sysfs writes"
                    ),
                }
            },
        );
    }

    fn start_udev_monitoring(self: &Rc<Self>) {
        let Some(device) = &self.device else {
            return;
        };

        let socket = match udev::MonitorBuilder::new()
            .and_then(|builder| builder.match_subsystem("backlight"))
            .and_then(|builder| builder.listen())
        {
            Ok(socket) => socket,
            Err(e) => {
                warn!("BacklightService: failed to start udev monitor: {}", e);
                return;
            }
        };

        let fd = socket.as_raw_fd();
        *self.udev_monitor.borrow_mut() = Some(socket);

        let device_name = device.name.clone();
        let this_weak = Rc::downgrade(self);

        let source_id = glib::unix_fd_add_local(fd, glib::IOCondition::IN, move |_fd, _cond| {
            let Some(this) = this_weak.upgrade() else {
                return glib::ControlFlow::Break;
            };

            // Drain all pending events before notifying, so the monitor is
            // not borrowed while subscribers run.
            let mut changes = 0usize;
            if let Some(socket) = this.udev_monitor.borrow().as_ref() {
                for event in socket.iter() {
                    if event.event_type() == udev::EventType::Change
                        && event.sysname().to_str() == Some(device_name.as_str())
                    {
                        changes += 1;
                    }
                }
            }

            let pending = changes > 0 && this.own_write_pending.replace(false);
            for _ in 0..notifications_for(changes, pending) {
                this.publish_current();
            }

            glib::ControlFlow::Continue
        });

        *self.udev_source_id.borrow_mut() = Some(source_id);
        debug!("BacklightService: udev monitoring started for backlight subsystem");
    }

    fn publish_current(&self) {
        match self.level() {
            Some(level) => self.feed.publish(level),
            None => error!("BacklightService: failed to read current brightness"),
        }
    }

    /// Calls org.freedesktop.login1.Session.SetBrightness(subsystem, name, brightness).
    fn set_via_logind(&self, device: &BacklightDevice, raw: u32) -> bool {
        let session_path = self.logind_session_path.borrow().clone();
        let connection = self.dbus_connection.borrow().clone();
        let (Some(session_path), Some(connection)) = (session_path, connection) else {
            return false;
        };

        let params = ("backlight", device.name.as_str(), raw).to_variant();
        let device_name = device.name.clone();

        connection.call(
            Some(LOGIND_BUS_NAME),
            &session_path,
            LOGIND_SESSION_INTERFACE,
            "SetBrightness",
            Some(&params),
            None,
            gio::DBusCallFlags::NONE,
            5000,
            None::<&gio::Cancellable>,
            move |res| {
                if let Err(e) = res {
                    error!(
                        "BacklightService: logind SetBrightness failed for {}: {}",
                        device_name, e
                    );
                }
            },
        );
        true
    }

    /// May fail if the user lacks write permission to the sysfs file.
    fn set_via_sysfs(&self, device: &BacklightDevice, raw: u32) {
        if let Err(err) = fs::write(&device.brightness_path, raw.to_string()) {
            error!(
                "BacklightService: failed to write brightness to {}: {err}",
                device.brightness_path.display()
            );
        }
    }
}

impl HardwareBrightness for BacklightService {
    fn subscribe(&self, callback: Box<dyn Fn(&HardwareEvent)>) -> Subscription {
        self.feed.subscribe(callback)
    }

    fn write_brightness(&self, level: f64) {
        let Some(device) = &self.device else {
            debug!("BacklightService::write_brightness called with no device available");
            return;
        };

        let raw = level_to_raw(level, self.min_raw, device.max_brightness_raw);
        debug!("BacklightService: writing raw brightness {raw} (level {level})");
        self.own_write_pending.set(true);
        if !self.set_via_logind(device, raw) {
            self.set_via_sysfs(device, raw);
        }
        // The udev monitor reports the resulting change like any other.
    }
}

impl Drop for BacklightService {
    fn drop(&mut self) {
        debug!("BacklightService dropped (device: {:?})", self.device_name());

        if let Some(source_id) = self.udev_source_id.borrow_mut().take() {
            source_id.remove();
        }
        self.udev_monitor.borrow_mut().take();
        self.dbus_connection.borrow_mut().take();
        self.logind_session_path.borrow_mut().take();
    }
}

fn read_u32_from_file(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse::<u32>().ok()
}

/// Session for this process, else the first session on seat0, else any.
fn find_logind_session(connection: &gio::DBusConnection) -> Option<String> {
    let pid = std::process::id();
    if let Ok(result) = connection.call_sync(
        Some(LOGIND_BUS_NAME),
        LOGIND_MANAGER_PATH,
        LOGIND_MANAGER_INTERFACE,
        "GetSessionByPID",
        Some(&(pid,).to_variant()),
        glib::VariantTy::new("(o)").ok(),
        gio::DBusCallFlags::NONE,
        5000,
        None::<&gio::Cancellable>,
    ) && let Some(session_path) = result.child_value(0).get::<String>()
    {
        return Some(session_path);
    }

    let result = connection
        .call_sync(
            Some(LOGIND_BUS_NAME),
            LOGIND_MANAGER_PATH,
            LOGIND_MANAGER_INTERFACE,
            "ListSessions",
            None,
            glib::VariantTy::new("(a(susso))").ok(),
            gio::DBusCallFlags::NONE,
            5000,
            None::<&gio::Cancellable>,
        )
        .ok()?;

    // (array of (session_id, uid, user_name, seat_id, object_path),)
    let sessions = result.child_value(0);
    let entries: Vec<(Option<String>, Option<String>)> = (0..sessions.n_children())
        .map(|i| {
            let session = sessions.child_value(i);
            (session.child_value(3).get(), session.child_value(4).get())
        })
        .collect();

    entries
        .iter()
        .find(|(seat, _)| seat.as_deref() == Some("seat0"))
        .or_else(|| entries.first())
        .and_then(|(_, path)| path.clone())
}
