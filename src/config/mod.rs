//! Application configuration.
//!
//! Aggregates configuration into a single Config struct that can be loaded
//! from YAML files or environment variables.

mod messaging;
mod server;

pub use messaging::{AmqpConfig, ConnectConfig, MessagingConfig, DEFAULT_EXCHANGE};
pub use server::ServerConfig;

pub use ::config::ConfigError;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ACCOUNTFLOW_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ACCOUNTFLOW";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ACCOUNTFLOW_LOG";

/// Broker URL, as read by the consuming services.
pub const RABBIT_MQ_URL_ENV_VAR: &str = "RABBIT_MQ_URL";
/// Broker URL, as read by the gateway.
pub const QUEUE_URL_ENV_VAR: &str = "QUEUE_URL";
/// Environment variable for the exchange name.
pub const EXCHANGE_NAME_ENV_VAR: &str = "EXCHANGE_NAME";
/// Environment variable for the gateway HTTP port.
pub const PORT_ENV_VAR: &str = "PORT";
/// Environment variable for the connect retry budget.
pub const MAX_CONNECT_RETRIES_ENV_VAR: &str = "MAX_CONNECT_RETRIES";
/// Environment variable for the connect retry sleep, in milliseconds.
pub const CONNECT_RETRY_SLEEP_ENV_VAR: &str = "CONNECT_RETRY_SLEEP";

use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker and retry configuration.
    pub messaging: MessagingConfig,
    /// Gateway HTTP server configuration.
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. Unprefixed variables (`RABBIT_MQ_URL`, `QUEUE_URL`, `EXCHANGE_NAME`,
    ///    `PORT`, `MAX_CONNECT_RETRIES`, `CONNECT_RETRY_SLEEP`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Some(config_path) = env_value(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let broker_url = env_value(RABBIT_MQ_URL_ENV_VAR).or_else(|| env_value(QUEUE_URL_ENV_VAR));

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("messaging.amqp.url", broker_url)?
            .set_override_option("messaging.amqp.exchange", env_value(EXCHANGE_NAME_ENV_VAR))?
            .set_override_option("server.port", positive_number(env_value(PORT_ENV_VAR)))?
            .set_override_option(
                "messaging.connect.max_retries",
                positive_number(env_value(MAX_CONNECT_RETRIES_ENV_VAR)),
            )?
            .set_override_option(
                "messaging.connect.retry_sleep_ms",
                positive_number(env_value(CONNECT_RETRY_SLEEP_ENV_VAR)),
            )?
            .build()?;

        config.try_deserialize()
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

/// Non-empty environment variable value.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a strictly positive integer; anything else falls back to the default.
fn positive_number(value: Option<String>) -> Option<i64> {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
}
