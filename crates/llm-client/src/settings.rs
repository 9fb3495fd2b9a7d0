//! Connection settings persistence for the panel.
//!
//! Settings live in a key-value store under a single key, mirroring the
//! browser `localStorage` record the panel historically used. The default
//! store is a JSON file in the user's config directory:
//! - macOS: ~/Library/Application Support/llm-client/storage.json
//! - Linux: ~/.config/llm-client/storage.json
//! - Windows: C:\Users\<User>\AppData\Roaming\llm-client\storage.json

use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Storage key holding the serialized [`ConnectionSettings`].
pub const SETTINGS_KEY: &str = "llm-client-settings";

pub const DEFAULT_HOST: &str = "10.1.5.1";
pub const DEFAULT_PORT: &str = "1088";
pub const DEFAULT_MODEL: &str = "vllm_model";

/// Endpoint the panel talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: String,

    #[serde(default)]
    pub model: String,

    /// Use `https` instead of `http` for the endpoint URL
    #[serde(default, rename = "https")]
    pub use_https: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            use_https: false,
        }
    }
}

impl ConnectionSettings {
    /// Replace empty fields with their defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.host.is_empty() {
            self.host = DEFAULT_HOST.to_string();
        }
        if self.port.is_empty() {
            self.port = DEFAULT_PORT.to_string();
        }
        if self.model.is_empty() {
            self.model = DEFAULT_MODEL.to_string();
        }
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }
}

/// A string key-value store with `localStorage` semantics.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a JSON object of string values on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location in the user's config directory.
    pub fn in_config_dir() -> Self {
        Self::new(store_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        // An unreadable file is replaced rather than blocking every save.
        let mut items = self.read_all().unwrap_or_default();
        items.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&items)?)?;
        Ok(())
    }
}

fn store_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("llm-client")
        .join("storage.json")
}

/// Load settings from the store, returning defaults if the record is
/// missing, unreadable or malformed.
pub fn load_settings(store: &dyn KeyValueStore) -> ConnectionSettings {
    let saved = match store.get_item(SETTINGS_KEY) {
        Ok(Some(saved)) => saved,
        Ok(None) => return ConnectionSettings::default(),
        Err(e) => {
            warn!("[llm-client] Failed to read settings: {}", e);
            return ConnectionSettings::default();
        }
    };

    match serde_json::from_str::<ConnectionSettings>(&saved) {
        Ok(settings) => settings.with_defaults(),
        Err(e) => {
            warn!("[llm-client] Failed to load settings: {}", e);
            ConnectionSettings::default()
        }
    }
}

/// Save the full settings record, filling empty fields with defaults.
pub fn save_settings(store: &mut dyn KeyValueStore, settings: &ConnectionSettings) -> Result<()> {
    let record = settings.clone().with_defaults();
    store.set_item(SETTINGS_KEY, &serde_json::to_string(&record)?)
}
