//! Configuration loaded from `$XDG_CONFIG_HOME/dimmer/config.toml`.
//!
//! Every field has a default, so an empty or missing file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Default configuration, matching `Config::default()`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# dimmer configuration

[dimmer]
# Virtual brightness change per button press below the backlight floor.
step = 0.05
# How long the "dimming ON/OFF" notification stays visible.
toast_timeout_ms = 1000
# Where the shortcut preference is stored (default: $XDG_STATE_HOME/dimmer/state.json).
# state_file = "/home/deck/.local/state/dimmer/state.json"

[backlight]
# Backlight device under /sys/class/backlight (default: auto-detect).
# device = "amdgpu_bl0"
# Raw value treated as the hardware floor.
min_raw = 0

[overlay]
# X displays to write gamescope overrides to (default: those used by Steam).
displays = []
# Directory for generated LUT files (default: $XDG_RUNTIME_DIR/dimmer).
# runtime_dir = "/run/user/1000/dimmer"
xprop = "xprop"
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub dimmer: DimmerConfig,
    pub backlight: BacklightConfig,
    pub overlay: OverlayConfig,
}

/// Reconciler and persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimmerConfig {
    pub step: f64,
    pub toast_timeout_ms: u64,
    pub state_file: Option<PathBuf>,
}

impl Default for DimmerConfig {
    fn default() -> Self {
        Self {
            step: 0.05,
            toast_timeout_ms: 1000,
            state_file: None,
        }
    }
}

impl DimmerConfig {
    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacklightConfig {
    pub device: Option<String>,
    pub min_raw: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    pub displays: Vec<String>,
    pub runtime_dir: Option<PathBuf>,
    pub xprop: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            displays: Vec::new(),
            runtime_dir: None,
            xprop: "xprop".to_string(),
        }
    }
}

impl OverlayConfig {
    /// Resolved LUT directory: configured, else `$XDG_RUNTIME_DIR/dimmer`,
    /// else `/tmp/dimmer`.
    pub fn runtime_dir(&self) -> PathBuf {
        if let Some(dir) = &self.runtime_dir {
            return dir.clone();
        }
        std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
            .join("dimmer")
    }
}

/// Outcome of `Config::load`.
#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    /// File the config was read from; `None` when defaults were used.
    pub source: Option<PathBuf>,
}

impl Config {
    /// `$XDG_CONFIG_HOME/dimmer/config.toml`, default `~/.config/dimmer/config.toml`.
    pub fn default_path() -> PathBuf {
        let config_home = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            format!("{}/.config", home)
        });
        PathBuf::from(config_home).join("dimmer").join("config.toml")
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// tried and a missing file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<ConfigLoadResult> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if required {
                return Err(Error::ConfigNotFound(path));
            }
            debug!("No config file at {:?}, using defaults", path);
            return Ok(ConfigLoadResult {
                config: Config::default(),
                source: None,
            });
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        debug!("Loaded config from {:?}", path);

        Ok(ConfigLoadResult {
            config,
            source: Some(path),
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let step = self.dimmer.step;
        if !step.is_finite() || step <= 0.0 || step > 1.0 {
            problems.push(format!("dimmer.step must be in (0, 1], got {step}"));
        }
        if self.dimmer.toast_timeout_ms == 0 {
            problems.push("dimmer.toast_timeout_ms must be greater than 0".to_string());
        }
        if let Some(device) = &self.backlight.device
            && (device.is_empty() || device.contains('/'))
        {
            problems.push(format!(
                "backlight.device must be a device name under /sys/class/backlight, got {device:?}"
            ));
        }
        if self.overlay.xprop.trim().is_empty() {
            problems.push("overlay.xprop must not be empty".to_string());
        }
        if self.overlay.displays.iter().any(|d| d.trim().is_empty()) {
            problems.push("overlay.displays must not contain empty entries".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigValidation(problems))
        }
    }
}
