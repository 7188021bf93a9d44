use crate::error::PageweaveError;
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

pub const DEFAULT_DATABASE: &str = "pageweave.db";

/// Runtime settings for the page service and CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Slugs no page may be created under or updated at. Compared case-insensitively after
    /// trimming.
    pub reserved_slugs: Vec<String>,
    /// SQLite database file used by the `service` store.
    pub database: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            reserved_slugs: vec!["home".to_string()],
            database: PathBuf::from(DEFAULT_DATABASE),
        }
    }
}

impl Settings {
    pub fn is_reserved(&self, slug: &str) -> bool {
        let slug = slug.trim();
        self.reserved_slugs
            .iter()
            .any(|reserved| reserved.trim().eq_ignore_ascii_case(slug))
    }
}

pub trait SettingsProvider: Send + Sync {
    fn get_settings(&self) -> Result<Settings, PageweaveError>;
    fn set_settings(&self, settings: &Settings) -> Result<(), PageweaveError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlSettingsProvider {
    path: PathBuf,
}

impl TomlSettingsProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlSettingsProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsProvider for TomlSettingsProvider {
    fn get_settings(&self) -> Result<Settings, PageweaveError> {
        tracing::debug!("Attempting to read settings from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using default settings.");
            return Ok(Settings::default());
        }
        let content = read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn set_settings(&self, settings: &Settings) -> Result<(), PageweaveError> {
        tracing::debug!("Attempting to write settings to: {:?}", &self.path);
        let toml_string = toml::to_string(settings)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
