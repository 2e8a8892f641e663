//! Configuration sources for the parameter conventions
//!
//! The conventions read from two stores: a flat [SettingsStore] of string values and a named
//! [ConnectionStore]. Both are implemented by closures and by [Configuration], which is
//! loaded with Figment from a TOML file and environment variables:
//!
//! ```toml
//! [app_settings]
//! timeout = "30"
//!
//! [connection_strings.orders]
//! connection_string = "Server=db;Database=orders"
//! provider_name = "postgres"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resolve::{Result, WiringError};
use crate::types::Dependency;

/// Default prefix of the environment variables read by [ConfigurationLoader]
pub const DEFAULT_ENV_PREFIX: &str = "HANAMI";

/// A named connection: connection string and provider name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStringSettings {
    pub name: String,
    pub connection_string: String,
    #[serde(default)]
    pub provider_name: String,
}

impl ConnectionStringSettings {
    pub fn new(
        name: impl Into<String>,
        connection_string: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            connection_string: connection_string.into(),
            provider_name: provider_name.into(),
        }
    }
}

impl Dependency for ConnectionStringSettings {}

/// Flat string-keyed settings
pub trait SettingsStore: Send + Sync {
    fn setting(&self, key: &str) -> Option<String>;
}

/// Named connection descriptors
pub trait ConnectionStore: Send + Sync {
    fn connection(&self, name: &str) -> Option<ConnectionStringSettings>;
}

impl<F> SettingsStore for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn setting(&self, key: &str) -> Option<String> {
        self(key)
    }
}

impl<F> ConnectionStore for F
where
    F: Fn(&str) -> Option<ConnectionStringSettings> + Send + Sync,
{
    fn connection(&self, name: &str) -> Option<ConnectionStringSettings> {
        self(name)
    }
}

/// Connection entry of a configuration file, named by its key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub connection_string: String,
    #[serde(default)]
    pub provider_name: String,
}

/// Application settings and connection strings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub app_settings: HashMap<String, String>,
    #[serde(default)]
    pub connection_strings: HashMap<String, ConnectionEntry>,
}

impl Configuration {
    /// Extract the configuration from any Figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| WiringError::Configuration(Box::new(e)))
    }
}

impl SettingsStore for Configuration {
    fn setting(&self, key: &str) -> Option<String> {
        self.app_settings.get(key).cloned()
    }
}

impl ConnectionStore for Configuration {
    fn connection(&self, name: &str) -> Option<ConnectionStringSettings> {
        self.connection_strings.get(name).map(|entry| {
            ConnectionStringSettings::new(
                name,
                entry.connection_string.as_str(),
                entry.provider_name.as_str(),
            )
        })
    }
}

/// Load a [Configuration] from a TOML file and environment variables.
///
/// Environment variables override the file. Nested keys are separated by a double underscore,
/// e.g. `HANAMI_APP_SETTINGS__TIMEOUT`; note that Figment lowercases environment keys.
#[derive(Clone, Debug)]
pub struct ConfigurationLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigurationLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Merge the configured sources, later sources override earlier ones.
    pub fn figment(&self) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = &self.config_path {
            if path.exists() {
                debug!(path = %path.display(), "loading configuration file");
                figment = figment.merge(Toml::file(path));
            } else {
                debug!(path = %path.display(), "configuration file not found");
            }
        }
        figment.merge(Env::prefixed(&format!("{}_", self.env_prefix)).split("__"))
    }

    pub fn load(&self) -> Result<Configuration> {
        Configuration::from_figment(&self.figment())
    }
}
