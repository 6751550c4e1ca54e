//! Application configuration.
//!
//! Settings load from `config/config.toml` (optional) layered with
//! `SLUICEGATE`-prefixed environment variables, e.g.
//! `SLUICEGATE__DATABASE__HOST` or `SLUICEGATE__RUNNER__HISTORY_SCHEMA`.
//! Every field has a working local-development default.

use crate::migration::DEFAULT_BENIGN_PATTERNS;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_dbname")]
    pub dbname: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "sluicegate_dev".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_password() -> String {
    "postgres".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: default_password(),
        }
    }
}

impl DatabaseConfig {
    /// Render the key-value connection string for `may_postgres`
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.dbname, self.user, self.password
        )
    }

    /// A loggable description of the target. Never includes the password.
    pub fn summary(&self) -> String {
        format!(
            "host={} port={} dbname={} user={}",
            self.host, self.port, self.dbname, self.user
        )
    }
}

/// Settings for the migration runner itself
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Directory holding versioned `V<n>__<description>.sql` scripts
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,
    /// Schema that owns the history table
    #[serde(default = "default_history_schema")]
    pub history_schema: String,
    /// Error substrings treated as already-applied schema state
    #[serde(default = "default_benign_patterns")]
    pub benign_patterns: Vec<String>,
}

fn default_migrations_dir() -> String {
    "migrations".to_string()
}

fn default_history_schema() -> String {
    "sluicegate".to_string()
}

fn default_benign_patterns() -> Vec<String> {
    DEFAULT_BENIGN_PATTERNS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            migrations_dir: default_migrations_dir(),
            history_schema: default_history_schema(),
            benign_patterns: default_benign_patterns(),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            runner: RunnerConfig::default(),
            environment: default_environment(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from `config/config.toml`, falling back to env vars.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if neither the file nor the environment yields a
    /// deserializable configuration.
    pub fn load() -> Result<Self, ConfigError> {
        // Build configuration by reading the TOML file (optional) and environment variables
        let builder = Config::builder()
            .add_source(File::with_name("config/config.toml").required(false))
            .add_source(Environment::with_prefix("SLUICEGATE").separator("__"));

        // Try to build the configuration, handling missing or unreadable file
        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // If the file existed but was unreadable (parse error, permission issue, etc.), log a warning and retry with env only
                if std::path::Path::new("config/config.toml").exists() {
                    eprintln!(
                        "Warning: failed to load config file, falling back to env. Error: {err}"
                    );
                }
                // Retry using only environment variables as source
                Config::builder()
                    .add_source(Environment::with_prefix("SLUICEGATE").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        // If even environment loading fails, return a clear combined error
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        // Deserialize the configuration into our AppConfig struct
        settings.try_deserialize::<AppConfig>().map_err(|e| {
            ConfigError::Message(format!(
                "Configuration could not be loaded from file or environment: {e}"
            ))
        })
    }
}
