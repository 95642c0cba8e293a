//! Background thread running an `OverlayDriver`.
//!
//! Overlay updates shell out to `xprop` and write LUT files, which is far
//! too slow for the main loop. Commands are sent over `std::sync::mpsc` to
//! a dedicated thread; the main loop never waits for them. Failures are
//! logged on the worker thread and dropped.
//!
//! When several level commands queue up (slider dragging, held buttons),
//! only the newest one is executed.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use super::{OverlayBackend, OverlayDriver};
use crate::error::Result;

/// Commands for the overlay worker thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayCommand {
    Activate,
    SetLevel(f64),
    Clear,
    Shutdown,
}

impl OverlayCommand {
    /// Commands that only matter if nothing newer replaces them.
    fn is_level(&self) -> bool {
        matches!(self, OverlayCommand::SetLevel(_) | OverlayCommand::Clear)
    }
}

/// Drop level commands superseded by a directly following level command.
pub fn coalesce(batch: Vec<OverlayCommand>) -> Vec<OverlayCommand> {
    let mut out: Vec<OverlayCommand> = Vec::with_capacity(batch.len());
    for cmd in batch {
        if cmd.is_level()
            && let Some(last) = out.last_mut()
            && last.is_level()
        {
            *last = cmd;
            continue;
        }
        out.push(cmd);
    }
    out
}

/// `OverlayBackend` that forwards to a driver on a background thread.
pub struct OverlayWorker {
    command_tx: Sender<OverlayCommand>,
    handle: Option<JoinHandle<()>>,
}

impl OverlayWorker {
    /// Start the worker thread. The driver is moved onto it.
    pub fn spawn<D: OverlayDriver>(driver: D) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<OverlayCommand>();
        let handle = thread::Builder::new()
            .name("dimmer-overlay".to_string())
            .spawn(move || overlay_worker_thread(driver, command_rx))?;

        Ok(Self {
            command_tx,
            handle: Some(handle),
        })
    }

    fn send(&self, cmd: OverlayCommand) {
        if self.command_tx.send(cmd).is_err() {
            warn!("OverlayWorker: worker thread gone; dropping {:?}", cmd);
        }
    }
}

impl OverlayBackend for OverlayWorker {
    fn activate(&self) {
        self.send(OverlayCommand::Activate);
    }

    fn set_level(&self, level: f64) {
        self.send(OverlayCommand::SetLevel(level));
    }

    fn clear(&self) {
        self.send(OverlayCommand::Clear);
    }
}

impl Drop for OverlayWorker {
    fn drop(&mut self) {
        self.send(OverlayCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("OverlayWorker: worker thread panicked");
        }
    }
}

fn overlay_worker_thread<D: OverlayDriver>(mut driver: D, command_rx: Receiver<OverlayCommand>) {
    debug!("OverlayWorker: worker thread started");

    loop {
        // Block for the next command, then drain whatever queued behind it.
        let first = match command_rx.recv() {
            Ok(cmd) => cmd,
            Err(mpsc::RecvError) => {
                debug!("OverlayWorker: command channel disconnected");
                break;
            }
        };
        let mut batch = vec![first];
        batch.extend(command_rx.try_iter());

        for cmd in coalesce(batch) {
            let result = match cmd {
                OverlayCommand::Activate => driver.activate(),
                OverlayCommand::SetLevel(level) => driver.set_level(level),
                OverlayCommand::Clear => driver.clear(),
                OverlayCommand::Shutdown => {
                    if let Err(e) = driver.shutdown() {
                        error!("OverlayWorker: shutdown failed: {e}");
                    }
                    debug!("OverlayWorker: worker thread exited");
                    return;
                }
            };
            if let Err(e) = result {
                error!("OverlayWorker: {:?} failed: {e}", cmd);
            }
        }
    }

    if let Err(e) = driver.shutdown() {
        error!("OverlayWorker: shutdown failed: {e}");
    }
}
