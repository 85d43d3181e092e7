use std::collections::HashMap;
use std::fs;
use std::path::Path;
use log::{debug, info, LevelFilter};
use serde::{Deserialize, Serialize};
use env_logger::{Builder, Target, WriteStyle};
use std::io::Write;

/// Logging subsystems of the now-playing backend and client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoggingSubsystem {
    /// Process startup, shutdown and wiring
    #[serde(rename = "main")]
    Main,
    /// Media session adapter and session sources
    #[serde(rename = "session")]
    Session,
    /// Filter rules and hot reload
    #[serde(rename = "filter")]
    Filter,
    /// Snapshot building and sinks
    #[serde(rename = "publisher")]
    Publisher,
    /// HTTP gateway and metadata relay
    #[serde(rename = "api")]
    Api,
    /// Overlay client state machine
    #[serde(rename = "client")]
    Client,
    /// Enrichment caches
    #[serde(rename = "cache")]
    Cache,
    /// MusicBrainz lookups
    #[serde(rename = "metadata")]
    Metadata,
    /// HTTP client operations
    #[serde(rename = "http")]
    Http,
    /// Third-party dependencies
    #[serde(rename = "deps")]
    Dependencies,
}

impl LoggingSubsystem {
    /// Get the module prefix for this subsystem
    pub fn module_prefix(&self) -> &'static str {
        match self {
            LoggingSubsystem::Main => "nowplaying",
            LoggingSubsystem::Session => "nowplaying::session",
            LoggingSubsystem::Filter => "nowplaying::filter",
            LoggingSubsystem::Publisher => "nowplaying::publisher,nowplaying::service",
            LoggingSubsystem::Api => "nowplaying::api",
            LoggingSubsystem::Client => "nowplaying::client",
            LoggingSubsystem::Cache => "nowplaying::helpers::attributecache,nowplaying::client::enrichment",
            LoggingSubsystem::Metadata => "nowplaying::helpers::musicbrainz",
            LoggingSubsystem::Http => "nowplaying::helpers::http_client,reqwest,hyper",
            LoggingSubsystem::Dependencies => "rocket,notify",
        }
    }

    /// Get all available subsystems
    pub fn all() -> Vec<LoggingSubsystem> {
        vec![
            LoggingSubsystem::Main,
            LoggingSubsystem::Session,
            LoggingSubsystem::Filter,
            LoggingSubsystem::Publisher,
            LoggingSubsystem::Api,
            LoggingSubsystem::Client,
            LoggingSubsystem::Cache,
            LoggingSubsystem::Metadata,
            LoggingSubsystem::Http,
            LoggingSubsystem::Dependencies,
        ]
    }

    fn parse(name: &str) -> Option<LoggingSubsystem> {
        match name.to_lowercase().as_str() {
            "main" => Some(LoggingSubsystem::Main),
            "session" => Some(LoggingSubsystem::Session),
            "filter" => Some(LoggingSubsystem::Filter),
            "publisher" => Some(LoggingSubsystem::Publisher),
            "api" => Some(LoggingSubsystem::Api),
            "client" => Some(LoggingSubsystem::Client),
            "cache" => Some(LoggingSubsystem::Cache),
            "metadata" => Some(LoggingSubsystem::Metadata),
            "http" => Some(LoggingSubsystem::Http),
            "deps" | "dependencies" => Some(LoggingSubsystem::Dependencies),
            _ => None,
        }
    }
}

/// Logging configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Global log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Target for log output (stdout, stderr)
    #[serde(default = "default_target")]
    pub target: String,

    #[serde(default = "default_timestamps")]
    pub timestamps: bool,

    #[serde(default = "default_colors")]
    pub colors: bool,

    /// Subsystem-specific log levels; unknown names are used as module paths
    #[serde(default)]
    pub subsystems: HashMap<String, String>,

    #[serde(default)]
    pub include_module_path: bool,

    #[serde(default)]
    pub include_line_numbers: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_target() -> String {
    "stderr".to_string()
}

fn default_timestamps() -> bool {
    true
}

fn default_colors() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            target: default_target(),
            timestamps: default_timestamps(),
            colors: default_colors(),
            subsystems: HashMap::new(),
            include_module_path: false,
            include_line_numbers: false,
        }
    }
}

impl LoggingConfig {
    /// Load logging configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read logging config file: {}", e))?;
        Self::from_json(&content)
    }

    /// Load logging configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json)
            .map_err(|e| format!("Failed to parse logging config JSON: {}", e))
    }

    /// Convert string log level to LevelFilter
    fn parse_log_level(level: &str) -> LevelFilter {
        match level.to_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => {
                eprintln!("Warning: Unknown log level '{}', defaulting to 'info'", level);
                LevelFilter::Info
            }
        }
    }

    /// Expand the configured subsystems into (module prefix, level) pairs
    fn module_filters(&self) -> Vec<(String, String)> {
        let mut filters = Vec::new();
        for (subsystem_name, level) in &self.subsystems {
            match LoggingSubsystem::parse(subsystem_name) {
                Some(subsystem) => {
                    for prefix in subsystem.module_prefix().split(',') {
                        filters.push((prefix.trim().to_string(), level.clone()));
                    }
                }
                None => filters.push((subsystem_name.clone(), level.clone())),
            }
        }
        filters.sort();
        filters
    }

    /// Build the environment filter string for env_logger
    pub fn build_filter_string(&self) -> String {
        let mut filter_parts = vec![self.level.clone()];
        for (prefix, level) in self.module_filters() {
            filter_parts.push(format!("{}={}", prefix, level));
        }
        filter_parts.join(",")
    }

    /// Initialize the logger with this configuration
    pub fn initialize_logger(&self) -> Result<(), String> {
        let filter_string = self.build_filter_string();
        debug!("Using logging filter: {}", filter_string);

        let mut builder = Builder::new();
        builder.filter(None, Self::parse_log_level(&self.level));
        for (prefix, level) in self.module_filters() {
            builder.filter(Some(&prefix), Self::parse_log_level(&level));
        }
        // RUST_LOG wins over the file
        builder.parse_env("RUST_LOG");

        builder.write_style(if self.colors { WriteStyle::Auto } else { WriteStyle::Never });

        match self.target.to_lowercase().as_str() {
            "stdout" => {
                builder.target(Target::Stdout);
            }
            "stderr" => {
                builder.target(Target::Stderr);
            }
            _ => {
                return Err(format!("Unknown logging target: {}", self.target));
            }
        }

        let include_module_path = self.include_module_path;
        let include_line_numbers = self.include_line_numbers;
        let timestamps = self.timestamps;

        builder.format(move |buf, record| {
            let mut output = String::new();

            if timestamps {
                output.push_str(&format!("[{}] ", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
            }

            output.push_str(&format!("[{}] ", record.level()));

            if include_module_path {
                if let Some(module) = record.module_path() {
                    output.push_str(&format!("[{}] ", module));
                }
            }

            if include_line_numbers {
                if let (Some(file), Some(line)) = (record.file(), record.line()) {
                    output.push_str(&format!("[{}:{}] ", file, line));
                }
            }

            output.push_str(&format!("{}", record.args()));

            writeln!(buf, "{}", output)
        });

        builder.try_init()
            .map_err(|e| format!("Failed to initialize logger: {}", e))?;

        info!("Logging initialized with filter: {}", filter_string);
        Ok(())
    }
}

/// Initialize logging from an optional configuration section and the command line flags
pub fn initialize_logging(config: Option<LoggingConfig>, debug_mode: bool, verbose_mode: bool) -> Result<(), String> {
    let mut config = config.unwrap_or_default();

    if debug_mode || verbose_mode {
        config.level = "debug".to_string();
    }

    config.initialize_logger()?;
    if debug_mode {
        info!("Debug mode enabled via command line");
    } else if verbose_mode {
        info!("Verbose mode enabled via command line");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = LoggingConfig::from_json("{}").unwrap();
        assert_eq!(config, LoggingConfig::default());
        assert_eq!(config.level, "info");
        assert_eq!(config.target, "stderr");
    }

    #[test]
    fn test_filter_string_expands_subsystems() {
        let mut config = LoggingConfig::default();
        config.subsystems.insert("session".to_string(), "debug".to_string());
        config.subsystems.insert("http".to_string(), "warn".to_string());

        let filter = config.build_filter_string();
        assert!(filter.starts_with("info,"));
        assert!(filter.contains("nowplaying::session=debug"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn test_unknown_subsystem_used_as_module_path() {
        let mut config = LoggingConfig::default();
        config.subsystems.insert("tokio::runtime".to_string(), "error".to_string());
        assert!(config.build_filter_string().contains("tokio::runtime=error"));
    }

    #[test]
    fn test_every_subsystem_has_a_prefix() {
        for subsystem in LoggingSubsystem::all() {
            assert!(!subsystem.module_prefix().is_empty());
        }
    }
}
