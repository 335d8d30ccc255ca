use crate::engine::EngineKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use uploadkit_core::settings::Settings;
use uploadkit_core::storage::{Error, ErrorKind, Result};

/// Identifies a storage back-end and the settings it is built from.
///
/// Two configurations that are equal share one back-end instance in a
/// [`Registry`](crate::Registry).
///
/// ```
/// use uploadkit::StorageConfig;
///
/// let config = StorageConfig::from_json(r#"{"engine": "local", "settings": {"UPLOAD_DIR": "/srv/uploads"}}"#).unwrap();
/// assert_eq!(config.engine, "local");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageConfig {
    /// The engine name: `local`, `ftp` or `oss`. Empty means not configured.
    #[serde(default)]
    pub engine: String,
    /// The engine specific settings, e.g. `FTP_SERVER_URL`.
    #[serde(default)]
    pub settings: Settings,
}

// Settings hold credentials, so only their names are shown.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("engine", &self.engine)
            .field("settings", &self.settings.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StorageConfig {
    /// A configuration for `engine` without any settings.
    pub fn new<E: Into<String>>(engine: E) -> Self {
        StorageConfig {
            engine: engine.into(),
            settings: Settings::new(),
        }
    }

    /// Adds or replaces a setting.
    pub fn with_setting<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Parses a configuration from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::new(ErrorKind::Configuration, e))
    }

    /// The engine this configuration selects. Fails for unknown engine names.
    pub fn kind(&self) -> Result<EngineKind> {
        self.engine.parse()
    }

    /// True when no engine was chosen.
    pub fn is_unset(&self) -> bool {
        self.engine.trim().is_empty()
    }
}
