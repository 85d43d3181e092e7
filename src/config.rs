// Configuration for the now-playing backend
//
// The configuration file is JSON. Every section is optional and every field has a default,
// so an empty object (or no file at all) is a valid configuration. Sections may live at the
// top level or below a "services" object.

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::constants::{self, DEFAULT_HOST, DEFAULT_OUTPUT_DIR, DEFAULT_PORT, FILTER_FILE, RELAY_UPSTREAM};
use crate::logging::LoggingConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration section '{section}': {message}")]
    Section { section: String, message: String },
}

/// Helper function to get a configuration section
///
/// The section is looked up in the "services" object first, then at the top level.
///
/// # Example
/// ```rust
/// use serde_json::json;
/// use nowplaying::config::get_service_config;
///
/// let config = json!({
///   "services": {
///     "relay": { "timeout_secs": 5 }
///   }
/// });
///
/// let relay = get_service_config(&config, "relay").unwrap();
/// assert_eq!(relay["timeout_secs"], 5);
///
/// let flat = json!({ "relay": { "timeout_secs": 3 } });
/// assert_eq!(get_service_config(&flat, "relay").unwrap()["timeout_secs"], 3);
/// ```
pub fn get_service_config<'a>(config: &'a serde_json::Value, service_name: &str) -> Option<&'a serde_json::Value> {
    if let Some(service_config) = config.get("services").and_then(|services| services.get(service_name)) {
        debug!("Found {} configuration in services section", service_name);
        return Some(service_config);
    }

    if let Some(service_config) = config.get(service_name) {
        debug!("Found {} configuration at top level", service_name);
        return Some(service_config);
    }

    debug!("No {} configuration found, using defaults", service_name);
    None
}

/// Which sink the publisher writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputMode {
    /// Durable files in the output directory
    Files,
    /// In-memory snapshot exposed through the HTTP gateway
    Serve,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Files
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Inline stylesheet and script into the overlay page
    pub single_file: bool,
    pub mode: OutputMode,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_OUTPUT_DIR),
            single_file: false,
            mode: OutputMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebserverConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebserverConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Rule file; defaults to `filter.txt` inside the output directory
    pub rules_file: Option<PathBuf>,
    pub hot_reload: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            rules_file: None,
            hot_reload: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub upstream: String,
    pub user_agent: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upstream: RELAY_UPSTREAM.to_string(),
            user_agent: None,
            timeout_secs: 10,
        }
    }
}

impl RelayConfig {
    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(constants::user_agent)
    }
}

/// Values given on the command line. They override the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output: Option<PathBuf>,
    pub serve: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub single_file: bool,
    pub filter: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    pub output: OutputConfig,
    pub webserver: WebserverConfig,
    pub filter: FilterConfig,
    pub relay: RelayConfig,
    pub logging: Option<LoggingConfig>,
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, ConfigError> {
        Ok(Self {
            output: section(value, "output")?.unwrap_or_default(),
            webserver: section(value, "webserver")?.unwrap_or_default(),
            filter: section(value, "filter")?.unwrap_or_default(),
            relay: section(value, "relay")?.unwrap_or_default(),
            logging: section(value, "logging")?,
        })
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(output) = &overrides.output {
            self.output.directory = output.clone();
        }
        if overrides.serve {
            self.output.mode = OutputMode::Serve;
        }
        if overrides.single_file {
            self.output.single_file = true;
        }
        if let Some(host) = &overrides.host {
            self.webserver.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.webserver.port = port;
        }
        if let Some(filter) = &overrides.filter {
            self.filter.rules_file = Some(filter.clone());
        }
    }

    /// Location of the filter rule file
    pub fn rules_path(&self) -> PathBuf {
        self.filter
            .rules_file
            .clone()
            .unwrap_or_else(|| self.output.directory.join(FILTER_FILE))
    }
}

fn section<T: serde::de::DeserializeOwned>(value: &serde_json::Value, name: &str) -> Result<Option<T>, ConfigError> {
    get_service_config(value, name)
        .map(|section| {
            serde_json::from_value(section.clone()).map_err(|e| ConfigError::Section {
                section: name.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_value(&json!({})).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.output.mode, OutputMode::Files);
        assert_eq!(config.webserver.port, 9863);
        assert_eq!(config.relay.upstream, "https://musicbrainz.org/ws/2/");
        assert_eq!(config.rules_path(), PathBuf::from("nowplaying").join("filter.txt"));
    }

    #[test]
    fn test_services_section_preferred() {
        let value = json!({
            "services": { "webserver": { "port": 8080 } },
            "webserver": { "port": 9090 }
        });
        let config = AppConfig::from_value(&value).unwrap();
        assert_eq!(config.webserver.port, 8080);
        assert_eq!(config.webserver.host, "127.0.0.1");
    }

    #[test]
    fn test_partial_sections() {
        let value = json!({
            "output": { "mode": "serve", "single_file": true },
            "filter": { "rules_file": "/etc/np/rules.txt", "hot_reload": false },
            "logging": { "level": "debug" }
        });
        let config = AppConfig::from_value(&value).unwrap();
        assert_eq!(config.output.mode, OutputMode::Serve);
        assert!(config.output.single_file);
        assert_eq!(config.output.directory, PathBuf::from("nowplaying"));
        assert!(!config.filter.hot_reload);
        assert_eq!(config.rules_path(), PathBuf::from("/etc/np/rules.txt"));
        assert_eq!(config.logging.unwrap().level, "debug");
    }

    #[test]
    fn test_invalid_section_reported() {
        let value = json!({ "webserver": { "port": "eighty" } });
        match AppConfig::from_value(&value) {
            Err(ConfigError::Section { section, .. }) => assert_eq!(section, "webserver"),
            other => panic!("expected section error, got {:?}", other),
        }
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::from_value(&json!({ "webserver": { "port": 1 } })).unwrap();
        config.apply_overrides(&ConfigOverrides {
            output: Some(PathBuf::from("/tmp/np")),
            serve: true,
            port: Some(2),
            ..Default::default()
        });
        assert_eq!(config.webserver.port, 2);
        assert_eq!(config.output.mode, OutputMode::Serve);
        assert_eq!(config.rules_path(), PathBuf::from("/tmp/np").join("filter.txt"));
    }

    #[test]
    fn test_relay_user_agent_default() {
        let relay = RelayConfig::default();
        assert!(relay.user_agent().starts_with("nowplaying-overlay/"));
        let custom = RelayConfig { user_agent: Some("me/1.0".into()), ..Default::default() };
        assert_eq!(custom.user_agent(), "me/1.0");
    }
}
