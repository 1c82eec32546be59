//! Configuration management
//!
//! This module handles loading, validation, and management of the relay
//! configuration. Configuration is stored in TOML format at
//! ~/.relay/config.toml and can be overridden from the environment.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **agents**: Downstream agent endpoints and the per-call timeout
//! - **server**: Bind address and advertised URL of the router agent
//! - **pipeline**: Retrieval scheduling and degradation settings
//!
//! # Environment Overrides
//!
//! Applied after the file is read, so a deployment can rebind agents
//! without touching the file:
//!
//! | Variable                   | Field                |
//! |----------------------------|----------------------|
//! | `TRANSLATOR_URL`           | `agents.translator`  |
//! | `MEMORY_URL`               | `agents.memory`      |
//! | `SEARCH_URL`               | `agents.search`      |
//! | `FINAL_URL`                | `agents.synthesis`   |
//! | `RELAY_AGENT_TIMEOUT_SECS` | `agents.timeout_secs`|
//! | `RELAY_HOST`               | `server.host`        |
//! | `RELAY_PORT`               | `server.port`        |
//!
//! # Examples
//!
//! ```no_run
//! use relay_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Search agent: {}", config.agents.search);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to write config file: {0}")]
    Write(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Downstream agent endpoints
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Router HTTP surface
    #[serde(default)]
    pub server: ServerConfig,

    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Downstream agent endpoints
///
/// Each value is the full `/tasks/send` URL of the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentsConfig {
    /// Translator agent
    #[serde(default = "default_translator_url")]
    pub translator: String,

    /// Memory / context agent
    #[serde(default = "default_memory_url")]
    pub memory: String,

    /// Live search agent
    #[serde(default = "default_search_url")]
    pub search: String,

    /// Final synthesis agent
    #[serde(default = "default_synthesis_url")]
    pub synthesis: String,

    /// Timeout for a single agent call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Router HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// URL advertised in the router's agent card
    #[serde(default)]
    pub public_url: Option<String>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Run context and search retrieval concurrently
    #[serde(default)]
    pub parallel_retrieval: bool,

    /// Result prefixes that mark an agent reply as an error string
    #[serde(default = "default_error_prefixes")]
    pub error_prefixes: Vec<String>,

    /// Text returned to the user when synthesis fails
    #[serde(default = "default_apology")]
    pub apology: String,

    /// Value of the `called_by` metadata entry sent to the memory agent
    #[serde(default = "default_called_by")]
    pub called_by: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_translator_url() -> String {
    "http://localhost:5001/tasks/send".to_string()
}

fn default_memory_url() -> String {
    "http://localhost:5002/tasks/send".to_string()
}

fn default_search_url() -> String {
    "http://localhost:5003/tasks/send".to_string()
}

fn default_synthesis_url() -> String {
    "http://localhost:5004/tasks/send".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5006
}

fn default_error_prefixes() -> Vec<String> {
    vec!["Error".to_string()]
}

/// Static apology substituted when the synthesis stage fails
pub const DEFAULT_APOLOGY: &str = "I apologize, but I'm having trouble processing your request at the moment. Please try again later.";

fn default_apology() -> String {
    DEFAULT_APOLOGY.to_string()
}

fn default_called_by() -> String {
    "RouterAgent".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            translator: default_translator_url(),
            memory: default_memory_url(),
            search: default_search_url(),
            synthesis: default_synthesis_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_retrieval: false,
            error_prefixes: default_error_prefixes(),
            apology: default_apology(),
            called_by: default_called_by(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            agents: AgentsConfig::default(),
            server: ServerConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AgentsConfig {
    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServerConfig {
    /// Address string suitable for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL advertised in the agent card
    pub fn advertised_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

impl Config {
    /// Load configuration from the default location (~/.relay/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    /// Environment overrides are applied before validation.
    pub fn load_or_create() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::load_from_path_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load configuration from a path, resolving overrides through `lookup`
    /// instead of the process environment
    pub fn load_from_path_with_env<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;

        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env_overrides(lookup)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the environment
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
        }

        let config = Self::default();
        let toml_string =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::Write(e.to_string()))?;
        fs::write(path, toml_string).map_err(|e| ConfigError::Write(e.to_string()))?;

        // Overrides are applied to the in-memory copy only
        let mut config = config;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.relay/config.toml)
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".relay").join("config.toml"))
    }

    /// Apply environment overrides using the given lookup
    ///
    /// The lookup is injected so tests do not have to mutate the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TRANSLATOR_URL") {
            self.agents.translator = url;
        }
        if let Some(url) = lookup("MEMORY_URL") {
            self.agents.memory = url;
        }
        if let Some(url) = lookup("SEARCH_URL") {
            self.agents.search = url;
        }
        if let Some(url) = lookup("FINAL_URL") {
            self.agents.synthesis = url;
        }
        if let Some(secs) = lookup("RELAY_AGENT_TIMEOUT_SECS") {
            self.agents.timeout_secs = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("RELAY_AGENT_TIMEOUT_SECS is not a number: {}", secs))
            })?;
        }
        if let Some(host) = lookup("RELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("RELAY_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("RELAY_PORT is not a valid port: {}", port))
            })?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        for (name, url) in [
            ("translator", &self.agents.translator),
            ("memory", &self.agents.memory),
            ("search", &self.agents.search),
            ("synthesis", &self.agents.synthesis),
        ] {
            validate_endpoint(name, url)?;
        }

        if self.agents.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "agents.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.apology.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "pipeline.apology must not be empty".to_string(),
            ));
        }

        if self.pipeline.error_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Invalid(
                "pipeline.error_prefixes must not contain empty strings".to_string(),
            ));
        }

        Ok(())
    }
}

/// Check that an agent endpoint is an absolute http(s) URL
fn validate_endpoint(name: &str, url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));

    match rest {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
        _ => Err(ConfigError::Invalid(format!(
            "agents.{} must be an absolute http(s) URL, got '{}'",
            name, url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.agents.translator, "http://localhost:5001/tasks/send");
        assert_eq!(config.agents.synthesis, "http://localhost:5004/tasks/send");
        assert_eq!(config.agents.timeout_secs, 30);
        assert_eq!(config.server.port, 5006);
        assert!(!config.pipeline.parallel_retrieval);
        assert_eq!(config.pipeline.error_prefixes, vec!["Error".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
[agents]
search = "http://search.internal:8080/tasks/send"
"#,
        )
        .unwrap();

        assert_eq!(config.agents.search, "http://search.internal:8080/tasks/send");
        assert_eq!(config.agents.memory, "http://localhost:5002/tasks/send");
        assert_eq!(config.core.log_level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MEMORY_URL", "http://memory:9000/tasks/send"),
            ("FINAL_URL", "http://final:9000/tasks/send"),
            ("RELAY_AGENT_TIMEOUT_SECS", "5"),
            ("RELAY_PORT", "7000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.agents.memory, "http://memory:9000/tasks/send");
        assert_eq!(config.agents.synthesis, "http://final:9000/tasks/send");
        assert_eq!(config.agents.translator, "http://localhost:5001/tasks/send");
        assert_eq!(config.agents.timeout_secs, 5);
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_env_override_bad_number() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|k| {
            (k == "RELAY_AGENT_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.core.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut config = Config::default();
        config.agents.search = "localhost:5003/tasks/send".to_string();
        assert!(config.validate().is_err());

        config.agents.search = "https:///tasks/send".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.agents.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_advertised_url() {
        let mut server = ServerConfig::default();
        assert_eq!(server.advertised_url(), "http://127.0.0.1:5006");

        server.public_url = Some("https://relay.example.com".to_string());
        assert_eq!(server.advertised_url(), "https://relay.example.com");
    }
}
