//! Control socket for CLI → daemon communication.
//!
//! Uses a Unix datagram socket in `$XDG_RUNTIME_DIR/dimmer.sock`. The CLI
//! sends one short text message per command; the daemon listens on the
//! GLib main loop and forwards each message to the dimmer.
//!
//! Message format (line-based text):
//! - `set:<level>` – set the virtual brightness (e.g., `set:0.4`)
//! - `reset` – remove dimming
//! - `shortcut:<0|1>` – turn button shortcut control off/on
//!
//! Sending is best-effort: if the daemon isn't running the CLI reports the
//! failure and exits.

use std::cell::RefCell;
use std::io;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, warn};

type ControlCallback = Rc<RefCell<Option<Rc<dyn Fn(ControlMessage)>>>>;

/// `$XDG_RUNTIME_DIR/dimmer.sock`, falling back to `/tmp/dimmer.sock`.
pub fn socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("dimmer.sock")
    } else {
        PathBuf::from("/tmp/dimmer.sock")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Set the virtual brightness (the slider).
    SetBrightness(f64),
    /// Remove dimming.
    Reset,
    /// Turn shortcut control on or off (the toggle).
    Shortcut(bool),
}

impl ControlMessage {
    pub fn to_wire(&self) -> String {
        match self {
            ControlMessage::SetBrightness(level) => format!("set:{}", level),
            ControlMessage::Reset => "reset".to_string(),
            ControlMessage::Shortcut(enabled) => {
                format!("shortcut:{}", if *enabled { 1 } else { 0 })
            }
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        let s = s.trim();
        if s == "reset" {
            return Some(ControlMessage::Reset);
        }
        if let Some(rest) = s.strip_prefix("set:") {
            let level: f64 = rest.parse().ok()?;
            return level.is_finite().then_some(ControlMessage::SetBrightness(level));
        }
        match s.strip_prefix("shortcut:")? {
            "1" => Some(ControlMessage::Shortcut(true)),
            "0" => Some(ControlMessage::Shortcut(false)),
            _ => None,
        }
    }
}

/// Send a message to the running daemon.
pub fn send(msg: &ControlMessage) -> io::Result<()> {
    let path = socket_path();
    let socket = UnixDatagram::unbound()?;
    socket.send_to(msg.to_wire().as_bytes(), &path)?;
    debug!("IPC: sent {:?} to {:?}", msg, path);
    Ok(())
}

/// Listener for control messages on the GLib main loop.
pub struct ControlListener {
    /// The bound socket (must stay alive while listening).
    _socket: UnixDatagram,
    /// Path to the socket file (for cleanup on drop).
    socket_path: PathBuf,
    /// GLib source ID for the fd watcher.
    source_id: Option<glib::SourceId>,
    callback: ControlCallback,
}

impl ControlListener {
    /// Bind the control socket and start watching it.
    pub fn new() -> Option<Rc<RefCell<Self>>> {
        let path = socket_path();

        // Remove stale socket if it exists.
        if path.exists() {
            let _ = std::fs::remove_file(&path);
        }

        let socket = match UnixDatagram::bind(&path) {
            Ok(s) => s,
            Err(e) => {
                warn!("IPC: failed to bind socket at {:?}: {}", path, e);
                return None;
            }
        };

        if let Err(e) = socket.set_nonblocking(true) {
            warn!("IPC: failed to set socket non-blocking: {}", e);
            return None;
        }

        debug!("IPC: listening on {:?}", path);

        let socket_fd = socket.as_raw_fd();
        let callback: ControlCallback = Rc::new(RefCell::new(None));
        let callback_for_watcher = callback.clone();

        let listener = Rc::new(RefCell::new(Self {
            _socket: socket,
            socket_path: path,
            source_id: None,
            callback,
        }));

        let listener_weak = Rc::downgrade(&listener);
        let source_id =
            glib::unix_fd_add_local(socket_fd, glib::IOCondition::IN, move |fd, _condition| {
                let mut buf = [0u8; 256];
                loop {
                    // SAFETY: fd stays open while the listener owns the socket,
                    // and the buffer is a valid stack allocation of buf.len() bytes.
                    let n = unsafe {
                        libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
                    };
                    if n <= 0 {
                        // EAGAIN on the non-blocking socket: drained.
                        break;
                    }

                    let Ok(text) = std::str::from_utf8(&buf[..n as usize]) else {
                        warn!("IPC: ignoring non-UTF-8 message");
                        continue;
                    };
                    match ControlMessage::from_wire(text) {
                        Some(msg) => {
                            debug!("IPC: received {:?}", msg);
                            let callback = callback_for_watcher.borrow().clone();
                            if let Some(cb) = callback {
                                cb(msg);
                            }
                        }
                        None => warn!("IPC: ignoring malformed message {:?}", text),
                    }
                }

                if listener_weak.upgrade().is_none() {
                    return glib::ControlFlow::Break;
                }
                glib::ControlFlow::Continue
            });

        listener.borrow_mut().source_id = Some(source_id);
        Some(listener)
    }

    /// Register the handler for incoming messages, replacing any previous one.
    pub fn connect<F>(&self, callback: F)
    where
        F: Fn(ControlMessage) + 'static,
    {
        *self.callback.borrow_mut() = Some(Rc::new(callback));
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        if let Some(source_id) = self.source_id.take() {
            source_id.remove();
        }
        let _ = std::fs::remove_file(&self.socket_path);
        debug!("IPC: listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            ControlMessage::from_wire("set:0.35\n"),
            Some(ControlMessage::SetBrightness(0.35))
        );
        assert_eq!(
            ControlMessage::from_wire("reset"),
            Some(ControlMessage::Reset)
        );
        assert_eq!(
            ControlMessage::from_wire("shortcut:1"),
            Some(ControlMessage::Shortcut(true))
        );
        assert_eq!(
            ControlMessage::from_wire("shortcut:0"),
            Some(ControlMessage::Shortcut(false))
        );
    }

    #[test]
    fn out_of_range_levels_are_passed_through() {
        // The controller clamps; the wire format does not.
        assert_eq!(
            ControlMessage::from_wire("set:-2"),
            Some(ControlMessage::SetBrightness(-2.0))
        );
    }

    #[test]
    fn rejects_malformed_messages() {
        for wire in ["", "set:", "set:abc", "set:NaN", "set:inf", "shortcut:yes", "dim"] {
            assert_eq!(ControlMessage::from_wire(wire), None, "accepted {wire:?}");
        }
    }

    #[test]
    fn wire_format_is_stable() {
        assert_eq!(ControlMessage::SetBrightness(0.5).to_wire(), "set:0.5");
        assert_eq!(ControlMessage::Shortcut(true).to_wire(), "shortcut:1");
        assert_eq!(ControlMessage::Reset.to_wire(), "reset");
    }
}
