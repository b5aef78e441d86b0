//! Signaling service configuration.
//!
//! Configuration is loaded from environment variables. Every key has a
//! default, so an empty environment yields a working single-node setup.

use crate::coordinator::ScopeKind;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Default WebSocket signaling bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default maximum inbound WebSocket message size (64 KiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Default per-connection outbox capacity.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Default time allowed for connections to drain on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 5;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "signaling";

/// Signaling service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Identifier for this instance, used in logs.
    pub instance_id: String,

    /// How room tokens map to channel keys (default: room).
    pub channel_scope: ScopeKind,

    /// Whether the `X-Forwarded-For` header is trusted as the client origin.
    pub trust_forwarded_for: bool,

    /// Maximum size of a single inbound WebSocket message.
    pub max_message_bytes: usize,

    /// Bounded capacity of each connection's outbound event queue.
    pub outbox_capacity: usize,

    /// Seconds to wait for connections to drain on shutdown.
    pub shutdown_grace_seconds: u64,

    /// Browser origins allowed to open a WebSocket. `None` allows any.
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("SIGNALING_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("SIGNALING_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let channel_scope = parse_var(vars, "SIGNALING_CHANNEL_SCOPE", ScopeKind::Room)?;

        let trust_forwarded_for = parse_var(vars, "SIGNALING_TRUST_FORWARDED_FOR", false)?;

        let max_message_bytes =
            parse_var(vars, "SIGNALING_MAX_MESSAGE_BYTES", DEFAULT_MAX_MESSAGE_BYTES)?;
        if max_message_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "SIGNALING_MAX_MESSAGE_BYTES must be greater than zero".to_string(),
            ));
        }

        let outbox_capacity =
            parse_var(vars, "SIGNALING_OUTBOX_CAPACITY", DEFAULT_OUTBOX_CAPACITY)?;
        if outbox_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "SIGNALING_OUTBOX_CAPACITY must be greater than zero".to_string(),
            ));
        }

        let shutdown_grace_seconds = parse_var(
            vars,
            "SIGNALING_SHUTDOWN_GRACE_SECONDS",
            DEFAULT_SHUTDOWN_GRACE_SECONDS,
        )?;

        let allowed_origins = vars
            .get("SIGNALING_ALLOWED_ORIGINS")
            .map(|raw| parse_origin_list(raw))
            .filter(|origins| !origins.is_empty());

        let instance_id = vars
            .get("SIGNALING_INSTANCE_ID")
            .cloned()
            .unwrap_or_else(|| {
                let hostname = env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
                let uuid_suffix = uuid::Uuid::new_v4().to_string();
                let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
                format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
            });

        Ok(Config {
            bind_address,
            health_bind_address,
            instance_id,
            channel_scope,
            trust_forwarded_for,
            max_message_bytes,
            outbox_capacity,
            shutdown_grace_seconds,
            allowed_origins,
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw}"))),
    }
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = HashMap::new();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert_eq!(config.channel_scope, ScopeKind::Room);
        assert!(!config.trust_forwarded_for);
        assert_eq!(config.max_message_bytes, DEFAULT_MAX_MESSAGE_BYTES);
        assert_eq!(config.outbox_capacity, DEFAULT_OUTBOX_CAPACITY);
        assert_eq!(
            config.shutdown_grace_seconds,
            DEFAULT_SHUTDOWN_GRACE_SECONDS
        );
        assert_eq!(config.allowed_origins, None);
        // Instance ID should be auto-generated
        assert!(config.instance_id.starts_with("signaling-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            (
                "SIGNALING_BIND_ADDRESS".to_string(),
                "127.0.0.1:9000".to_string(),
            ),
            (
                "SIGNALING_HEALTH_BIND_ADDRESS".to_string(),
                "127.0.0.1:9001".to_string(),
            ),
            ("SIGNALING_CHANNEL_SCOPE".to_string(), "origin".to_string()),
            (
                "SIGNALING_TRUST_FORWARDED_FOR".to_string(),
                "true".to_string(),
            ),
            (
                "SIGNALING_MAX_MESSAGE_BYTES".to_string(),
                "4096".to_string(),
            ),
            ("SIGNALING_OUTBOX_CAPACITY".to_string(), "32".to_string()),
            (
                "SIGNALING_SHUTDOWN_GRACE_SECONDS".to_string(),
                "10".to_string(),
            ),
            (
                "SIGNALING_INSTANCE_ID".to_string(),
                "signaling-custom-001".to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.health_bind_address, "127.0.0.1:9001");
        assert_eq!(config.channel_scope, ScopeKind::Origin);
        assert!(config.trust_forwarded_for);
        assert_eq!(config.max_message_bytes, 4096);
        assert_eq!(config.outbox_capacity, 32);
        assert_eq!(config.shutdown_grace_seconds, 10);
        assert_eq!(config.instance_id, "signaling-custom-001");
    }

    #[test]
    fn test_from_vars_allowed_origins() {
        let vars = HashMap::from([(
            "SIGNALING_ALLOWED_ORIGINS".to_string(),
            " https://meet.example.com/, http://localhost:3000 ,,".to_string(),
        )]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(
            config.allowed_origins,
            Some(vec![
                "https://meet.example.com".to_string(),
                "http://localhost:3000".to_string(),
            ])
        );
    }

    #[test]
    fn test_from_vars_blank_allowed_origins_allows_any() {
        let vars = HashMap::from([("SIGNALING_ALLOWED_ORIGINS".to_string(), " , ".to_string())]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.allowed_origins, None);
    }

    #[test]
    fn test_from_vars_invalid_scope() {
        let vars = HashMap::from([(
            "SIGNALING_CHANNEL_SCOPE".to_string(),
            "subnet".to_string(),
        )]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(v)) if v.contains("SIGNALING_CHANNEL_SCOPE"))
        );
    }

    #[test]
    fn test_from_vars_invalid_bool() {
        let vars = HashMap::from([(
            "SIGNALING_TRUST_FORWARDED_FOR".to_string(),
            "yes please".to_string(),
        )]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_zero_capacity() {
        let vars = HashMap::from([("SIGNALING_OUTBOX_CAPACITY".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(v)) if v.contains("SIGNALING_OUTBOX_CAPACITY"))
        );
    }

    #[test]
    fn test_from_vars_rejects_non_numeric_size() {
        let vars = HashMap::from([(
            "SIGNALING_MAX_MESSAGE_BYTES".to_string(),
            "lots".to_string(),
        )]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
