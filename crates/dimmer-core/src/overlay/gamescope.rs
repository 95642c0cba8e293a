//! Gamescope overlay driver.
//!
//! Gamescope exposes color management overrides as X root window
//! properties on the displays it serves to Steam. Dimming is applied by:
//! - forcing composition (`GAMESCOPE_COMPOSITE_FORCE`) so the color
//!   pipeline always runs,
//! - pointing the 3D LUT override at an identity cube,
//! - pointing the shaper LUT override at a table scaled by the level.
//!
//! Properties are written with the `xprop` tool, one invocation per
//! display and property.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use super::OverlayDriver;
use super::lut;
use crate::config::OverlayConfig;
use crate::error::{Error, Result};

const COMPOSITE_FORCE: &str = "GAMESCOPE_COMPOSITE_FORCE";
const LUT3D_OVERRIDE: &str = "GAMESCOPE_COLOR_3DLUT_OVERRIDE";
const SHAPER_LUT_OVERRIDE: &str = "GAMESCOPE_COLOR_SHAPERLUT_OVERRIDE";

const LUT1D_FILE: &str = "dim.lut1d";
const LUT3D_FILE: &str = "dim.lut3d";

/// Overlay driver writing gamescope color overrides through `xprop`.
pub struct GamescopeOverlay {
    /// Displays given in the config; discovered from `/proc` when empty.
    configured_displays: Vec<String>,
    /// Displays the overrides are written to.
    displays: Vec<String>,
    /// Directory holding the generated LUT files.
    runtime_dir: PathBuf,
    /// `xprop` executable.
    xprop: String,
    /// Whether composition and the 3D LUT have been set since the last clear.
    prepared: bool,
}

impl GamescopeOverlay {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            configured_displays: config.displays.clone(),
            displays: Vec::new(),
            runtime_dir: config.runtime_dir(),
            xprop: config.xprop.clone(),
            prepared: false,
        }
    }

    pub fn displays(&self) -> &[String] {
        &self.displays
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn lut1d_path(&self) -> PathBuf {
        self.runtime_dir.join(LUT1D_FILE)
    }

    pub fn lut3d_path(&self) -> PathBuf {
        self.runtime_dir.join(LUT3D_FILE)
    }

    /// Turn on forced composition and the identity 3D LUT on every display.
    fn prepare(&mut self) -> Result<()> {
        debug!("GamescopeOverlay: preparing {} display(s)", self.displays.len());
        let lut3d = self.lut3d_path().display().to_string();
        for target in &self.displays {
            self.set_property(target, COMPOSITE_FORCE, "8c", "1")?;
            self.set_property(target, LUT3D_OVERRIDE, "8u", &lut3d)?;
        }
        self.prepared = true;
        Ok(())
    }

    fn set_property(&self, target: &str, name: &str, kind: &str, value: &str) -> Result<()> {
        self.run_xprop(&["-root", "-d", target, "-f", name, kind, "-set", name, value])
    }

    fn remove_property(&self, target: &str, name: &str) -> Result<()> {
        self.run_xprop(&["-root", "-d", target, "-remove", name])
    }

    fn run_xprop(&self, args: &[&str]) -> Result<()> {
        let output = Command::new(&self.xprop).args(args).output()?;
        if output.status.success() {
            return Ok(());
        }

        let command = format!("{} {}", self.xprop, args.join(" "));
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("GamescopeOverlay: xprop stdout: {}", stdout.trim());
        }
        Err(Error::Xprop {
            command,
            status: output.status.to_string(),
            stderr,
        })
    }
}

impl OverlayDriver for GamescopeOverlay {
    fn activate(&mut self) -> Result<()> {
        self.displays = if self.configured_displays.is_empty() {
            discover_steam_displays(Path::new("/proc"))
        } else {
            self.configured_displays.clone()
        };
        if self.displays.is_empty() {
            warn!("GamescopeOverlay: no Steam displays found; dimming will have no effect");
        }
        info!("GamescopeOverlay: using displays {:?}", self.displays);

        fs::create_dir_all(&self.runtime_dir)?;
        lut::write_lut3d(&self.lut3d_path(), 1.0)?;
        self.prepared = false;
        Ok(())
    }

    fn set_level(&mut self, level: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&level) {
            return Err(Error::InvalidLevel(level));
        }
        if !self.prepared {
            self.prepare()?;
        }

        lut::write_lut1d(&self.lut1d_path(), level)?;
        let lut1d = self.lut1d_path().display().to_string();
        for target in &self.displays {
            self.set_property(target, SHAPER_LUT_OVERRIDE, "8u", &lut1d)?;
        }
        debug!("GamescopeOverlay: level {level:.3} applied");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.prepared = false;

        // Keep going after a failure so one bad display does not leave the
        // others dimmed; report the first error.
        let mut first_error = None;
        for target in &self.displays {
            for name in [COMPOSITE_FORCE, SHAPER_LUT_OVERRIDE, LUT3D_OVERRIDE] {
                if let Err(e) = self.remove_property(target, name) {
                    warn!("GamescopeOverlay: failed to remove {name} on {target}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                debug!("GamescopeOverlay: overlay cleared");
                Ok(())
            }
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.prepared {
            self.clear()
        } else {
            Ok(())
        }
    }
}

/// Find the X displays of running Steam clients.
///
/// Scans `<proc_root>/<pid>/cmdline` for processes whose executable name
/// ends in `steam` and collects the `DISPLAY` value from their environment.
/// Unreadable processes are skipped. Order follows discovery, without
/// duplicates.
pub fn discover_steam_displays(proc_root: &Path) -> Vec<String> {
    let mut displays: Vec<String> = Vec::new();

    let entries = match fs::read_dir(proc_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("GamescopeOverlay: failed to read {}: {e}", proc_root.display());
            return displays;
        }
    };

    let mut pids: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
        .collect();
    pids.sort();

    for pid in pids {
        let Ok(cmdline) = fs::read(pid.join("cmdline")) else {
            continue;
        };
        let exe = cmdline.split(|&b| b == 0).next().unwrap_or_default();
        if !exe.ends_with(b"steam") {
            continue;
        }
        debug!("GamescopeOverlay: found steam process {}", pid.display());

        let Ok(environ) = fs::read(pid.join("environ")) else {
            continue;
        };
        for var in environ.split(|&b| b == 0) {
            let Some(value) = var.strip_prefix(b"DISPLAY=") else {
                continue;
            };
            let display_name = String::from_utf8_lossy(value).into_owned();
            if !displays.contains(&display_name) {
                debug!("GamescopeOverlay: found steam display {display_name}");
                displays.push(display_name);
            }
        }
    }

    displays
}
