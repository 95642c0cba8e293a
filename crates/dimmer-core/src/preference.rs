//! Persisted preferences.
//!
//! Preferences are string key/value pairs. On disk they live in a JSON
//! object at `$XDG_STATE_HOME/dimmer/state.json`. A missing or unreadable
//! file loads as empty, and write failures are logged rather than
//! surfaced; losing a preference must never stop the dimmer.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Key/value preference storage.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, persisting immediately.
    fn set(&self, key: &str, value: &str);
}

/// Read a boolean stored as `"true"`/`"false"`. Anything else is `false`.
pub fn get_flag(store: &dyn PreferenceStore, key: &str) -> bool {
    store.get(key).as_deref() == Some("true")
}

pub fn set_flag(store: &dyn PreferenceStore, key: &str, value: bool) {
    store.set(key, if value { "true" } else { "false" });
}

/// Default location of the state file.
///
/// Location: `$XDG_STATE_HOME/dimmer/state.json`
/// Default: `~/.local/state/dimmer/state.json`
pub fn default_state_path() -> PathBuf {
    let state_home = std::env::var("XDG_STATE_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{}/.local/state", home)
    });
    PathBuf::from(state_home).join("dimmer").join("state.json")
}

/// JSON-file backed `PreferenceStore`.
pub struct StateFile {
    path: PathBuf,
    values: RefCell<BTreeMap<String, String>>,
}

impl StateFile {
    /// Open the state file at `path`, loading whatever it currently holds.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = load(&path);
        Self {
            path,
            values: RefCell::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) {
        if let Some(parent) = self.path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Failed to create state directory {:?}: {}", parent, e);
            return;
        }

        match serde_json::to_string_pretty(&*self.values.borrow()) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!("Failed to save state to {:?}: {}", self.path, e);
                } else {
                    debug!("Saved state to {:?}", self.path);
                }
            }
            Err(e) => warn!("Failed to serialize state: {}", e),
        }
    }
}

impl PreferenceStore for StateFile {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.save();
    }
}

fn load(path: &Path) -> BTreeMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(values) => {
                debug!("Loaded state from {:?}", path);
                values
            }
            Err(e) => {
                warn!("Failed to parse state file {:?}: {}", path, e);
                BTreeMap::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No state file found at {:?}, using defaults", path);
            BTreeMap::new()
        }
        Err(e) => {
            warn!("Failed to read state file {:?}: {}", path, e);
            BTreeMap::new()
        }
    }
}

/// In-memory `PreferenceStore`, also counting writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<BTreeMap<String, String>>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(key: &str, value: &str) -> Self {
        let store = Self::default();
        store
            .values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        store
    }

    /// Number of `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.writes.set(self.writes.get() + 1);
    }
}
