//! Configuration for a tracepath SDK session
//!
//! Provides:
//! - Config file discovery (explicit path, env var, standard paths)
//! - TOML parsing with serde
//! - Environment variable overrides
//! - Validation of agent options

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Agents that can back a session
pub const AGENT_KINDS: [&str; 2] = ["null", "mock"];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete SDK configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// SDK settings
    pub sdk: SdkSettings,

    /// Diagnostic settings
    pub diagnostics: DiagnosticsSettings,
}

/// SDK settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkSettings {
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,

    /// Agent backing the SDK: null or mock
    pub agent: String,

    /// Agent options, each `NAME=VALUE`
    pub options: Vec<String>,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            agent: "null".to_string(),
            options: Vec::new(),
        }
    }
}

/// Diagnostic settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    /// Warn about tracers dropped while still running
    pub leak_warnings: bool,

    /// Log the tree of every completed path at debug level
    pub log_completed_paths: bool,

    /// Keep completed paths in the session archive
    ///
    /// With this off only the completion metric and the debug log see a path.
    pub retain_completed_paths: bool,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            leak_warnings: true,
            log_completed_paths: false,
            retain_completed_paths: true,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Explicitly requested config path
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            explicit_path: None,
        }
    }

    /// Set an explicit config path
    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    /// Load configuration with the following precedence:
    /// 1. Explicit path
    /// 2. TRACEPATH_CONFIG environment variable
    /// 3. ~/.config/tracepath/config.toml
    /// 4. /etc/tracepath/config.toml
    /// 5. Default values
    pub fn load(&self) -> ConfigResult<SdkConfig> {
        let mut config = if let Some(path) = self.find_config_file() {
            info!("Loading configuration from: {}", path.display());
            self.load_from_file(&path)?
        } else {
            debug!("No config file found, using defaults");
            SdkConfig::default()
        };

        self.apply_env_overrides(&mut config);
        self.validate(&config)?;

        Ok(config)
    }

    /// Find the config file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit_path {
            if path.exists() {
                return Some(path.clone());
            }
            warn!("Config path does not exist: {}", path.display());
        }

        if let Ok(env_path) = std::env::var("TRACEPATH_CONFIG") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            warn!("TRACEPATH_CONFIG path does not exist: {}", env_path);
        }

        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Some(path);
            }
        }

        #[cfg(unix)]
        {
            let path = PathBuf::from("/etc/tracepath/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(&self, path: &Path) -> ConfigResult<SdkConfig> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: SdkConfig = toml::from_str(&content)?;
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut SdkConfig) {
        apply_overrides(config, |name| std::env::var(name).ok());
    }

    /// Validate configuration
    pub fn validate(&self, config: &SdkConfig) -> ConfigResult<()> {
        if !LOG_LEVELS.contains(&config.sdk.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                config.sdk.log_level, LOG_LEVELS
            )));
        }

        if !AGENT_KINDS.contains(&config.sdk.agent.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid agent: {}. Must be one of: {:?}",
                config.sdk.agent, AGENT_KINDS
            )));
        }

        for option in &config.sdk.options {
            match option.split_once('=') {
                Some((name, _)) if !name.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid agent option: {:?}. Expected NAME=VALUE",
                        option
                    )))
                }
            }
        }

        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, config: &SdkConfig, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| {
            ConfigError::ValidationError(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Get the default config file path for the current platform
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("tracepath").join("config.toml"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply overrides from a variable lookup
///
/// `TRACEPATH_OPTIONS` is a comma separated list and replaces the configured
/// options.
fn apply_overrides(config: &mut SdkConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("TRACEPATH_LOG_LEVEL") {
        config.sdk.log_level = val;
    }
    if let Some(val) = var("TRACEPATH_AGENT") {
        config.sdk.agent = val.trim().to_lowercase();
    }
    if let Some(val) = var("TRACEPATH_OPTIONS") {
        config.sdk.options = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(val) = var("TRACEPATH_LEAK_WARNINGS") {
        config.diagnostics.leak_warnings =
            val.parse().unwrap_or(config.diagnostics.leak_warnings);
    }
    if let Some(val) = var("TRACEPATH_RETAIN_PATHS") {
        config.diagnostics.retain_completed_paths =
            val.parse().unwrap_or(config.diagnostics.retain_completed_paths);
    }
}

/// Helper module for platform-specific directories
mod dirs {
    use std::path::PathBuf;

    /// Get the user's config directory
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }

        #[cfg(not(target_os = "windows"))]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SdkConfig::default();
        assert_eq!(config.sdk.log_level, "info");
        assert_eq!(config.sdk.agent, "null");
        assert!(config.sdk.options.is_empty());
        assert!(config.diagnostics.leak_warnings);
        assert!(config.diagnostics.retain_completed_paths);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
            [sdk]
            log_level = "debug"
        "#;
        let config: SdkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sdk.log_level, "debug");
        assert_eq!(config.sdk.agent, "null");
        assert!(config.diagnostics.leak_warnings);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
            [sdk]
            log_level = "trace"
            agent = "mock"
            options = ["loglevelsdk=finest", "tenant=abc"]

            [diagnostics]
            leak_warnings = false
            log_completed_paths = true
            retain_completed_paths = false
        "#;
        let config: SdkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sdk.agent, "mock");
        assert_eq!(config.sdk.options, vec!["loglevelsdk=finest", "tenant=abc"]);
        assert!(!config.diagnostics.leak_warnings);
        assert!(config.diagnostics.log_completed_paths);
        assert!(!config.diagnostics.retain_completed_paths);
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let config = SdkConfig {
            sdk: SdkSettings {
                log_level: "loud".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(ConfigLoader::new().validate(&config).is_err());
    }

    #[test]
    fn test_validation_invalid_agent_and_option() {
        let loader = ConfigLoader::new();
        let mut config = SdkConfig::default();
        config.sdk.agent = "native".to_string();
        assert!(loader.validate(&config).is_err());

        let mut config = SdkConfig::default();
        config.sdk.options = vec!["novalue".to_string()];
        assert!(loader.validate(&config).is_err());

        config.sdk.options = vec!["=x".to_string()];
        assert!(loader.validate(&config).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TRACEPATH_LOG_LEVEL", "warn"),
            ("TRACEPATH_AGENT", " Mock "),
            ("TRACEPATH_OPTIONS", "a=1, b=2,,"),
            ("TRACEPATH_LEAK_WARNINGS", "false"),
            ("TRACEPATH_RETAIN_PATHS", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = SdkConfig::default();
        apply_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.sdk.log_level, "warn");
        assert_eq!(config.sdk.agent, "mock");
        assert_eq!(config.sdk.options, vec!["a=1", "b=2"]);
        assert!(!config.diagnostics.leak_warnings);
        assert!(!config.diagnostics.retain_completed_paths);
    }

    #[test]
    fn test_unparseable_bool_override_keeps_value() {
        let mut config = SdkConfig::default();
        apply_overrides(&mut config, |name| {
            (name == "TRACEPATH_LEAK_WARNINGS").then(|| "maybe".to_string())
        });
        assert!(config.diagnostics.leak_warnings);
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SdkConfig::default();
        config.sdk.agent = "mock".to_string();
        config.sdk.options = vec!["x=y".to_string()];

        let loader = ConfigLoader::new();
        loader.save(&config, &path).unwrap();
        let loaded = loader.load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigLoader::new().load_from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_serialize_config() {
        let toml_str = toml::to_string_pretty(&SdkConfig::default()).unwrap();
        assert!(toml_str.contains("[sdk]"));
        assert!(toml_str.contains("[diagnostics]"));
    }
}
