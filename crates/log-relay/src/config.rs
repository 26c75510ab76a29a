// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! File based configuration for the relay.
//!
//! The configuration is a YAML document (by default `/etc/log-relay/config.yaml`) merged with
//! environment overrides prefixed by `LOG_RELAY_`. Nested keys are separated by a double
//! underscore, so `LOG_RELAY_LOKI__SERVER` overrides `loki.server`.
//!
//! ```yaml
//! log_level: info
//! redis:
//!   host: 127.0.0.1:6379
//!   password: secret
//!   db: 0
//!   keys:
//!     - app-a
//!     - app-b
//! loki:
//!   server: http://127.0.0.1:3100
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/log-relay/config.yaml";
const ENV_PREFIX: &str = "LOG_RELAY_";
const DEFAULT_REDIS_PORT: u16 = 6379;
const LOKI_PUSH_PATH: &str = "/loki/api/v1/push";
const LOKI_READY_PATH: &str = "/ready";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub redis: RedisConfig,
    pub loki: LokiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Queue connection settings and the partition keys to drain
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RedisConfig {
    /// `host:port`, the port defaults to 6379
    pub host: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
    /// One list per key, one worker per list
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LokiConfig {
    /// Base address, e.g. `http://loki:3100`
    pub server: String,
    /// Per request timeout. Unset means a slow push blocks its partition until it completes.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub https_proxy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Sleep after a poll that found the queue empty
    pub idle_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub interval_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:6666".to_string(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: 100,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

impl Config {
    /// Reads the YAML file at `path`, applies `LOG_RELAY_*` overrides and validates the result.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis.keys.is_empty() {
            return Err(ConfigError::Invalid(
                "redis.keys must contain at least one key".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for key in &self.redis.keys {
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "redis.keys cannot contain an empty key".to_string(),
                ));
            }
            if !seen.insert(key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "redis.keys contains duplicate key '{key}'"
                )));
            }
        }

        self.redis.connection_info()?;

        let server = self.loki.server.trim();
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "loki.server must be an http(s) URL, got '{}'",
                self.loki.server
            )));
        }

        if self.loki.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "loki.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.metrics.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "metrics.listen_addr '{}' is not a socket address",
                self.metrics.listen_addr
            )));
        }

        if self.worker.idle_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "worker.idle_backoff_ms must be greater than 0".to_string(),
            ));
        }

        if self.stats.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "stats.interval_secs must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

impl RedisConfig {
    pub fn connection_info(&self) -> Result<ConnectionInfo, ConfigError> {
        let (host, port) = split_host_port(&self.host)?;
        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone().filter(|p| !p.is_empty()),
                ..Default::default()
            },
        })
    }
}

impl LokiConfig {
    pub fn push_url(&self) -> String {
        format!("{}{LOKI_PUSH_PATH}", self.base())
    }

    pub fn ready_url(&self) -> String {
        format!("{}{LOKI_READY_PATH}", self.base())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn base(&self) -> &str {
        self.server.trim().trim_end_matches('/')
    }
}

impl WorkerConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

impl StatsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn split_host_port(addr: &str) -> Result<(String, u16), ConfigError> {
    let addr = addr.trim();
    if addr.is_empty() {
        return Err(ConfigError::Invalid("redis.host cannot be empty".to_string()));
    }

    // a bare IPv6 address has colons but no port
    if addr.starts_with('[') && addr.ends_with(']') {
        return Ok((addr.trim_matches(['[', ']']).to_string(), DEFAULT_REDIS_PORT));
    }

    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("redis.host '{addr}' has an invalid port"))
            })?;
            Ok((host.trim_matches(['[', ']']).to_string(), port))
        }
        Some(_) => Err(ConfigError::Invalid(format!(
            "redis.host '{addr}' is missing a host name"
        ))),
        None => Ok((addr.to_string(), DEFAULT_REDIS_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_YAML: &str = r#"
redis:
  host: 127.0.0.1:6379
  keys: [app-a, app-b]
loki:
  server: http://127.0.0.1:3100
"#;

    fn valid_config() -> Config {
        Config {
            log_level: "info".to_string(),
            redis: RedisConfig {
                host: "localhost".to_string(),
                password: None,
                db: 0,
                keys: vec!["k1".to_string()],
            },
            loki: LokiConfig {
                server: "http://localhost:3100".to_string(),
                timeout_secs: None,
                https_proxy: None,
            },
            metrics: MetricsConfig::default(),
            worker: WorkerConfig::default(),
            stats: StatsConfig::default(),
        }
    }

    #[test]
    fn test_load_minimal_file_uses_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", MINIMAL_YAML)?;
            let config = Config::load(Path::new("config.yaml")).expect("config should load");

            assert_eq!(config.log_level, "info");
            assert_eq!(config.redis.keys, vec!["app-a", "app-b"]);
            assert_eq!(config.redis.db, 0);
            assert_eq!(config.redis.password, None);
            assert_eq!(config.metrics.listen_addr, "0.0.0.0:6666");
            assert_eq!(config.worker.idle_backoff(), Duration::from_millis(100));
            assert_eq!(config.stats.interval(), Duration::from_secs(10));
            assert_eq!(config.loki.timeout(), None);
            Ok(())
        });
    }

    #[test]
    fn test_load_full_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
log_level: debug
redis:
  host: redis.internal:6380
  password: hunter2
  db: 3
  keys: [k1]
loki:
  server: https://loki.internal/
  timeout_secs: 30
metrics:
  listen_addr: 127.0.0.1:9100
worker:
  idle_backoff_ms: 250
stats:
  interval_secs: 60
"#,
            )?;
            let config = Config::load(Path::new("config.yaml")).expect("config should load");

            assert_eq!(config.log_level, "debug");
            assert_eq!(config.redis.password.as_deref(), Some("hunter2"));
            assert_eq!(config.redis.db, 3);
            assert_eq!(config.loki.push_url(), "https://loki.internal/loki/api/v1/push");
            assert_eq!(config.loki.ready_url(), "https://loki.internal/ready");
            assert_eq!(config.loki.timeout(), Some(Duration::from_secs(30)));
            assert_eq!(config.metrics.listen_addr, "127.0.0.1:9100");
            assert_eq!(config.worker.idle_backoff(), Duration::from_millis(250));
            assert_eq!(config.stats.interval(), Duration::from_secs(60));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", MINIMAL_YAML)?;
            jail.set_env("LOG_RELAY_LOG_LEVEL", "warn");
            jail.set_env("LOG_RELAY_LOKI__SERVER", "http://loki:3100");
            let config = Config::load(Path::new("config.yaml")).expect("config should load");

            assert_eq!(config.log_level, "warn");
            assert_eq!(config.loki.server, "http://loki:3100");
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_file() {
        figment::Jail::expect_with(|_jail| {
            let err = Config::load(Path::new("absent.yaml")).unwrap_err();
            assert!(matches!(err, ConfigError::NotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_empty_keys() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
redis:
  host: 127.0.0.1
  keys: []
loki:
  server: http://127.0.0.1:3100
"#,
            )?;
            let err = Config::load(Path::new("config.yaml")).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_missing_section() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "redis:\n  host: 127.0.0.1\n  keys: [a]\n")?;
            let err = Config::load(Path::new("config.yaml")).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)));
            Ok(())
        });
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_duplicate_and_blank_keys() {
        let mut config = valid_config();
        config.redis.keys = vec!["a".to_string(), "a".to_string()];
        assert!(config.validate().is_err());

        config.redis.keys = vec!["a".to_string(), "  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_loki_server() {
        let mut config = valid_config();
        config.loki.server = "loki:3100".to_string();
        assert!(config.validate().is_err());

        config.loki.server = "".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = valid_config();
        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.log_level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_intervals() {
        let mut config = valid_config();
        config.worker.idle_backoff_ms = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.stats.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.loki.timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_metrics_addr() {
        let mut config = valid_config();
        config.metrics.listen_addr = ":6666".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connection_info() {
        let mut redis = valid_config().redis;
        redis.host = "cache:6380".to_string();
        redis.password = Some("".to_string());
        redis.db = 2;
        let info = redis.connection_info().expect("valid host");
        assert!(matches!(&info.addr, ConnectionAddr::Tcp(host, 6380) if host == "cache"));
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password, None);

        redis.host = "cache".to_string();
        redis.password = Some("pw".to_string());
        let info = redis.connection_info().expect("valid host");
        assert!(matches!(&info.addr, ConnectionAddr::Tcp(host, 6379) if host == "cache"));
        assert_eq!(info.redis.password.as_deref(), Some("pw"));

        redis.host = "[::1]:6390".to_string();
        let info = redis.connection_info().expect("valid host");
        assert!(matches!(&info.addr, ConnectionAddr::Tcp(host, 6390) if host == "::1"));
    }

    #[test]
    fn test_connection_info_rejects_bad_port() {
        let mut redis = valid_config().redis;
        redis.host = "cache:notaport".to_string();
        assert!(redis.connection_info().is_err());

        redis.host = ":6379".to_string();
        assert!(redis.connection_info().is_err());
    }
}
