//! Configuration for the webhook server.
//!
//! Loads configuration from TOML files with environment variable substitution.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 3000
//! path = "/webhooks"
//!
//! [webhook]
//! secret = "${SHOPIFY_WEBHOOK_SECRET}"
//!
//! # Omit to dispatch inline on the request task
//! [pool]
//! workers = 10
//! queue_capacity = 1000
//! max_retries = 3
//! retry_base_delay_ms = 500
//!
//! # Omit to disable deduplication
//! [dedup]
//! ttl_secs = 86400
//!
//! [shutdown]
//! timeout_secs = 30
//! ```

use crate::pool::PoolConfig;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "WEBHOOKS_CONFIG";

/// Fallback for `webhook.secret` when the file leaves it empty.
pub const SECRET_ENV: &str = "SHOPIFY_WEBHOOK_SECRET";

const DEFAULT_CONFIG_PATH: &str = "config/webhooks.toml";
const ENV_VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Background processing; `None` dispatches inline
    #[serde(default)]
    pub pool: Option<PoolSettings>,

    /// Deduplication; `None` disables it
    #[serde(default)]
    pub dedup: Option<DedupConfig>,

    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            path: default_path(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_path() -> String {
    crate::http::DEFAULT_WEBHOOK_PATH.to_string()
}

/// Webhook verification settings
#[derive(Deserialize, Clone, Default)]
pub struct WebhookConfig {
    /// App client secret used as the HMAC key
    #[serde(default)]
    pub secret: String,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Worker pool settings
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl PoolSettings {
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.workers, self.queue_capacity)
            .with_max_retries(self.max_retries)
            .with_retry_base_delay(Duration::from_millis(self.retry_base_delay_ms))
    }
}

fn default_workers() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

/// Deduplication settings
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DedupConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Shared Redis store instead of the in-memory one (feature `redis`)
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            redis_url: None,
        }
    }
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

/// Graceful shutdown settings
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ShutdownConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl WebhooksConfig {
    /// Load configuration from the default path or `WEBHOOKS_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults. An empty `webhook.secret` is
    /// filled from `SHOPIFY_WEBHOOK_SECRET`.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading configuration");
            let content = fs::read_to_string(path)?;
            Self::parse(&content)?
        } else {
            info!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            Self::default()
        };

        if config.webhook.secret.is_empty() {
            if let Ok(secret) = env::var(SECRET_ENV) {
                debug!(var = SECRET_ENV, "Using webhook secret from environment");
                config.webhook.secret = secret;
            }
        }

        config.validate()?;

        info!(
            port = config.server.port,
            path = %config.server.path,
            async_pool = config.pool.is_some(),
            dedup = config.dedup.is_some(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Parse TOML after substituting `${VAR}` placeholders. Does not validate.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let content = substitute_env_vars(content)?;

        debug!("Parsing TOML configuration");
        Ok(toml::from_str(&content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.secret.is_empty() {
            return Err(ConfigError::MissingField("webhook.secret".to_string()));
        }

        if self.webhook.secret.contains("${") {
            return Err(ConfigError::ValidationError(
                "webhook.secret contains an unsubstituted environment variable".to_string(),
            ));
        }

        if !self.server.path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "server.path '{}' must start with '/'",
                self.server.path
            )));
        }

        if let Some(pool) = &self.pool {
            pool.to_pool_config().validate()?;

            if pool.max_retries > 0 && pool.retry_base_delay_ms == 0 {
                warn!("Retries configured with zero base delay, failed events retry immediately");
            }
        }

        if let Some(dedup) = &self.dedup {
            if dedup.ttl_secs == 0 {
                return Err(ConfigError::ValidationError(
                    "dedup.ttl_secs must be greater than zero".to_string(),
                ));
            }

            if dedup.redis_url.is_some() && !cfg!(feature = "redis") {
                warn!("dedup.redis_url is set but the `redis` feature is disabled, using in-memory store");
            }
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN)
        .map_err(|e| ConfigError::ValidationError(format!("invalid placeholder pattern: {e}")))?;

    Ok(re
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    debug!(var = %var_name, "Environment variable not set, keeping placeholder");
                    caps[0].to_string()
                }
            }
        })
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("WEBHOOKS_TEST_VAR", "substituted_value");
        let input = "secret = \"${WEBHOOKS_TEST_VAR}\"";
        let output = substitute_env_vars(input).unwrap();
        assert_eq!(output, "secret = \"substituted_value\"");
        env::remove_var("WEBHOOKS_TEST_VAR");
    }

    #[test]
    fn test_env_var_not_set() {
        let input = "secret = \"${NONEXISTENT_VAR}\"";
        let output = substitute_env_vars(input).unwrap();
        assert_eq!(output, "secret = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [server]
            port = 4000

            [webhook]
            secret = "hush"
        "#;

        let config = WebhooksConfig::parse(toml).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.path, "/webhooks");
        assert!(config.pool.is_none());
        assert!(config.dedup.is_none());
        assert_eq!(config.shutdown.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            port = 8080
            path = "/shopify/webhooks"

            [webhook]
            secret = "hush"

            [pool]
            workers = 4
            queue_capacity = 0
            max_retries = 3
            retry_base_delay_ms = 250

            [dedup]
            ttl_secs = 3600

            [shutdown]
            timeout_secs = 5
        "#;

        let config = WebhooksConfig::parse(toml).unwrap();
        assert!(config.validate().is_ok());

        let pool = config.pool.as_ref().unwrap().to_pool_config();
        assert_eq!(pool.workers, 4);
        assert_eq!(pool.queue_capacity, 0);
        assert_eq!(pool.max_retries, 3);
        assert_eq!(pool.retry_base_delay, Duration::from_millis(250));

        assert_eq!(config.dedup.unwrap().ttl(), Duration::from_secs(3600));
        assert_eq!(config.shutdown.timeout(), Duration::from_secs(5));
        assert_eq!(config.server.path, "/shopify/webhooks");
    }

    #[test]
    fn test_pool_table_defaults() {
        let config = WebhooksConfig::parse("[pool]\n").unwrap();
        assert_eq!(config.pool, Some(PoolSettings::default()));
        assert_eq!(
            config.pool.unwrap().to_pool_config().retry_base_delay,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_validation_missing_secret() {
        let config = WebhooksConfig::parse("[server]\nport = 3000\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField(field)) if field == "webhook.secret"
        ));
    }

    #[test]
    fn test_validation_unsubstituted_secret() {
        let toml = "[webhook]\nsecret = \"${WEBHOOKS_DEFINITELY_UNSET}\"\n";
        let config = WebhooksConfig::parse(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_zero_workers() {
        let toml = r#"
            [webhook]
            secret = "hush"

            [pool]
            workers = 0
        "#;

        let config = WebhooksConfig::parse(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_zero_ttl() {
        let toml = r#"
            [webhook]
            secret = "hush"

            [dedup]
            ttl_secs = 0
        "#;

        let config = WebhooksConfig::parse(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_oversized_queue() {
        let toml = r#"
            [webhook]
            secret = "hush"

            [pool]
            workers = 4
            queue_capacity = 5000000000000000000
        "#;

        let config = WebhooksConfig::parse(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_huge_dedup_ttl_is_accepted() {
        let toml = r#"
            [webhook]
            secret = "hush"

            [dedup]
            ttl_secs = 9223372036854775807
        "#;

        let config = WebhooksConfig::parse(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.dedup.unwrap().ttl(),
            Duration::from_secs(i64::MAX as u64)
        );
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = WebhooksConfig::parse("[webhook]\nsecret = \"hush\"\n").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hush"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_missing_file_uses_defaults_and_env_secret() {
        env::set_var(SECRET_ENV, "from-env");
        let config = WebhooksConfig::load_from("does/not/exist.toml").unwrap();
        env::remove_var(SECRET_ENV);

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.webhook.secret, "from-env");
    }
}
