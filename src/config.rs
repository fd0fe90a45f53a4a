//! `qail.toml` settings used by the `qail-json` binary.
//!
//! ```toml
//! [postgres]
//! url = "postgres://localhost/mydb"
//!
//! [json]
//! type_name = "json"
//! pretty = false
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{JsonError, JsonResult};
use crate::registry::JsonStyle;

pub const CONFIG_FILE: &str = "qail.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub json: JsonSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostgresSettings {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonSettings {
    #[serde(default = "default_type_name")]
    pub type_name: String,
    #[serde(default)]
    pub pretty: bool,
}

fn default_type_name() -> String {
    "json".to_string()
}

impl Default for JsonSettings {
    fn default() -> Self {
        Self {
            type_name: default_type_name(),
            pretty: false,
        }
    }
}

impl JsonSettings {
    pub fn style(&self) -> JsonStyle {
        if self.pretty {
            JsonStyle::Pretty
        } else {
            JsonStyle::Compact
        }
    }
}

impl Settings {
    pub fn from_toml(content: &str) -> JsonResult<Self> {
        toml::from_str(content)
            .map_err(|e| JsonError::configuration(format!("Invalid {}: {}", CONFIG_FILE, e)))
    }

    pub fn from_file(path: &Path) -> JsonResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            JsonError::configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load `qail.toml` from the current directory, then from the user config
    /// directory. Missing files give the defaults.
    pub fn load() -> JsonResult<Self> {
        match Self::locate() {
            Some(path) => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("qail").join(CONFIG_FILE))
            .filter(|path| path.exists())
    }
}
