// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven configuration for the registrar.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::metrics::parse_metric_namespace;
use crate::registration::RegistrationPayload;

const ENV_CONFIG_SERVER_URL: &str = "RELAY_CONFIG_SERVER_URL";
const ENV_METRIC_PREFIX: &str = "RELAY_METRIC_PREFIX";
const ENV_HOST: &str = "RELAY_HOST";
/// Fallback for [`ENV_HOST`], set by most shells and container runtimes.
const ENV_HOSTNAME: &str = "HOSTNAME";
const ENV_AVG_METRIC_VOLUME: &str = "RELAY_AVG_METRIC_VOLUME";
const ENV_ENV: &str = "RELAY_ENV";
const ENV_INFRASTRUCTURE: &str = "RELAY_INFRASTRUCTURE";
const ENV_TIMEOUT_SECS: &str = "RELAY_REGISTRATION_TIMEOUT_SECS";
const ENV_REFRESH_INTERVAL_SECS: &str = "RELAY_REFRESH_INTERVAL_SECS";
const ENV_PROXY_HTTPS: &str = "RELAY_PROXY_HTTPS";
const ENV_HTTPS_PROXY: &str = "HTTPS_PROXY";
const ENV_STATSD_ADDR: &str = "RELAY_STATSD_ADDR";
const ENV_STATSD_NAMESPACE: &str = "RELAY_STATSD_NAMESPACE";
const ENV_LOG_LEVEL: &str = "RELAY_LOG_LEVEL";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_AVG_METRIC_VOLUME: u64 = 100;
const DEFAULT_ENV: &str = "prd";
const DEFAULT_INFRASTRUCTURE: &str = "1P";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_LOG_LEVEL: &str = "info";

const MAX_TIMEOUT: Duration = Duration::from_secs(3600);
const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(86400);

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings for registering this relay and keeping its rules fresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrarConfig {
    /// Base URL of the config server, e.g. `https://cfg.example.com`.
    pub config_server_base_url: String,
    /// Metric prefix identifying this relay.
    pub metric_prefix: String,
    pub host: String,
    pub avg_metric_volume: u64,
    pub env: String,
    pub infrastructure: String,
    /// Per-request timeout for the registration call.
    pub timeout: Duration,
    /// Period of the background refresh. `Duration::ZERO` disables it.
    pub refresh_interval: Duration,
    pub https_proxy: Option<String>,
    /// DogStatsD endpoint receiving registration counters.
    pub statsd_addr: Option<SocketAddr>,
    pub statsd_namespace: Option<String>,
    pub log_level: String,
}

impl RegistrarConfig {
    /// Config with every optional setting at its default.
    pub fn new(config_server_base_url: impl Into<String>, metric_prefix: impl Into<String>) -> Self {
        Self {
            config_server_base_url: config_server_base_url.into(),
            metric_prefix: metric_prefix.into(),
            host: DEFAULT_HOST.to_string(),
            avg_metric_volume: DEFAULT_AVG_METRIC_VOLUME,
            env: DEFAULT_ENV.to_string(),
            infrastructure: DEFAULT_INFRASTRUCTURE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            https_proxy: None,
            statsd_addr: None,
            statsd_namespace: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Reads and validates the config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_iter(env::vars())
    }

    /// Log level from the process environment, usable before the rest of the
    /// config is parsed.
    pub fn log_level_from_env() -> String {
        Self::log_level_from_env_iter(env::vars())
    }

    /// Lowercased `RELAY_LOG_LEVEL`, or the default when it is unset or not
    /// a known level.
    pub fn log_level_from_env_iter<I, K, V>(iter: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        iter.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .find(|(k, _)| k == ENV_LOG_LEVEL)
            .map(|(_, v)| v.trim().to_lowercase())
            .filter(|level| VALID_LOG_LEVELS.contains(&level.as_str()))
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    /// Reads and validates the config from key/value pairs.
    pub fn from_env_iter<I, K, V>(iter: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| lookup(&map, key);

        let config_server_base_url =
            get(ENV_CONFIG_SERVER_URL).ok_or(ConfigError::Missing(ENV_CONFIG_SERVER_URL))?;
        let metric_prefix = get(ENV_METRIC_PREFIX).ok_or(ConfigError::Missing(ENV_METRIC_PREFIX))?;

        let mut config = Self::new(config_server_base_url, metric_prefix);
        if let Some(host) = get(ENV_HOST).or_else(|| get(ENV_HOSTNAME)) {
            config.host = host.to_string();
        }
        if let Some(volume) = get(ENV_AVG_METRIC_VOLUME) {
            config.avg_metric_volume = parse_number(ENV_AVG_METRIC_VOLUME, volume)?;
        }
        if let Some(env) = get(ENV_ENV) {
            config.env = env.to_string();
        }
        if let Some(infrastructure) = get(ENV_INFRASTRUCTURE) {
            config.infrastructure = infrastructure.to_string();
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, secs)?);
        }
        if let Some(secs) = get(ENV_REFRESH_INTERVAL_SECS) {
            config.refresh_interval =
                Duration::from_secs(parse_number(ENV_REFRESH_INTERVAL_SECS, secs)?);
        }
        config.https_proxy = get(ENV_PROXY_HTTPS)
            .or_else(|| get(ENV_HTTPS_PROXY))
            .map(str::to_string);
        if let Some(addr) = get(ENV_STATSD_ADDR) {
            config.statsd_addr = Some(addr.parse().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_STATSD_ADDR} is not a socket address: '{addr}'"))
            })?);
        }
        config.statsd_namespace = get(ENV_STATSD_NAMESPACE).and_then(parse_metric_namespace);
        if let Some(level) = get(ENV_LOG_LEVEL) {
            config.log_level = level.to_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.config_server_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "config server URL must start with http:// or https://, got '{url}'"
            )));
        }
        if self.metric_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "metric prefix cannot be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "registration timeout must be greater than 0".to_string(),
            ));
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(ConfigError::Invalid(format!(
                "registration timeout cannot exceed {} seconds",
                MAX_TIMEOUT.as_secs()
            )));
        }
        if self.refresh_interval > MAX_REFRESH_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "refresh interval cannot exceed {} seconds",
                MAX_REFRESH_INTERVAL.as_secs()
            )));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Registration payload carrying this relay's identity.
    pub fn payload(&self) -> RegistrationPayload {
        RegistrationPayload::new(
            self.metric_prefix.clone(),
            self.host.clone(),
            self.avg_metric_volume,
            self.env.clone(),
            self.infrastructure.clone(),
        )
    }
}

/// Trimmed value for `key`, treating blank values as unset.
fn lookup<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(format!("{key} must be a non-negative integer, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_CONFIG_SERVER_URL, "http://cfg.test"),
            (ENV_METRIC_PREFIX, "relay"),
        ]
    }

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut vars = required();
        vars.extend_from_slice(extra);
        vars
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = RegistrarConfig::from_env_iter(required()).unwrap();
        assert_eq!(config, RegistrarConfig::new("http://cfg.test", "relay"));
        assert_eq!(config.host, "localhost");
        assert_eq!(config.avg_metric_volume, 100);
        assert_eq!(config.env, "prd");
        assert_eq!(config.infrastructure, "1P");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn missing_required_vars_are_reported() {
        let err = RegistrarConfig::from_env_iter(vec![(ENV_METRIC_PREFIX, "relay")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_CONFIG_SERVER_URL)));

        let err = RegistrarConfig::from_env_iter(vec![
            (ENV_CONFIG_SERVER_URL, "http://cfg.test"),
            (ENV_METRIC_PREFIX, "   "),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_METRIC_PREFIX)));
    }

    #[test]
    fn reads_every_optional_setting() {
        let config = RegistrarConfig::from_env_iter(with(&[
            (ENV_HOST, "relay-01.internal"),
            (ENV_AVG_METRIC_VOLUME, "2500"),
            (ENV_ENV, "stg"),
            (ENV_INFRASTRUCTURE, "aws"),
            (ENV_TIMEOUT_SECS, "3"),
            (ENV_REFRESH_INTERVAL_SECS, "0"),
            (ENV_PROXY_HTTPS, "http://proxy.test:3128"),
            (ENV_STATSD_ADDR, "127.0.0.1:8125"),
            (ENV_STATSD_NAMESPACE, "relay"),
            (ENV_LOG_LEVEL, "DEBUG"),
        ]))
        .unwrap();

        assert_eq!(config.host, "relay-01.internal");
        assert_eq!(config.avg_metric_volume, 2500);
        assert_eq!(config.env, "stg");
        assert_eq!(config.infrastructure, "aws");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.refresh_interval, Duration::ZERO);
        assert_eq!(config.https_proxy.as_deref(), Some("http://proxy.test:3128"));
        assert_eq!(config.statsd_addr, Some("127.0.0.1:8125".parse().unwrap()));
        assert_eq!(config.statsd_namespace.as_deref(), Some("relay"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn host_and_proxy_fall_back_to_common_vars() {
        let config = RegistrarConfig::from_env_iter(with(&[
            (ENV_HOSTNAME, "container-7"),
            (ENV_HTTPS_PROXY, "http://proxy.test:8080"),
        ]))
        .unwrap();
        assert_eq!(config.host, "container-7");
        assert_eq!(config.https_proxy.as_deref(), Some("http://proxy.test:8080"));

        let config = RegistrarConfig::from_env_iter(with(&[
            (ENV_HOST, "relay-01"),
            (ENV_HOSTNAME, "container-7"),
        ]))
        .unwrap();
        assert_eq!(config.host, "relay-01");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for extra in [
            (ENV_AVG_METRIC_VOLUME, "lots"),
            (ENV_TIMEOUT_SECS, "0"),
            (ENV_TIMEOUT_SECS, "-1"),
            (ENV_TIMEOUT_SECS, "3601"),
            (ENV_REFRESH_INTERVAL_SECS, "soon"),
            (ENV_REFRESH_INTERVAL_SECS, "86401"),
            (ENV_REFRESH_INTERVAL_SECS, "18446744073709551615"),
            (ENV_STATSD_ADDR, "localhost"),
            (ENV_LOG_LEVEL, "verbose"),
        ] {
            let result = RegistrarConfig::from_env_iter(with(&[extra]));
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "{extra:?} should be rejected"
            );
        }
    }

    #[test]
    fn interval_and_timeout_accept_their_upper_bounds() {
        let config = RegistrarConfig::from_env_iter(with(&[
            (ENV_TIMEOUT_SECS, "3600"),
            (ENV_REFRESH_INTERVAL_SECS, "86400"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3600));
        assert_eq!(config.refresh_interval, Duration::from_secs(86400));
    }

    #[test]
    fn log_level_is_readable_on_its_own() {
        let level = RegistrarConfig::log_level_from_env_iter(vec![(ENV_LOG_LEVEL, " WARN ")]);
        assert_eq!(level, "warn");

        // Broken settings elsewhere do not affect the log level.
        let level = RegistrarConfig::log_level_from_env_iter(vec![
            (ENV_LOG_LEVEL, "debug"),
            (ENV_REFRESH_INTERVAL_SECS, "soon"),
        ]);
        assert_eq!(level, "debug");

        let unset: Vec<(&str, &str)> = Vec::new();
        assert_eq!(RegistrarConfig::log_level_from_env_iter(unset), "info");
        assert_eq!(
            RegistrarConfig::log_level_from_env_iter(vec![(ENV_LOG_LEVEL, "verbose")]),
            "info"
        );
    }

    #[test]
    #[traced_test]
    fn invalid_statsd_namespace_is_ignored() {
        let config =
            RegistrarConfig::from_env_iter(with(&[(ENV_STATSD_NAMESPACE, "9lives")])).unwrap();
        assert_eq!(config.statsd_namespace, None);
        assert!(logs_contain("Ignoring namespace"));
    }

    #[test]
    fn validate_requires_http_url() {
        let config = RegistrarConfig::new("cfg.test", "relay");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = RegistrarConfig::new("https://cfg.test", "relay");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn payload_carries_identity_fields() {
        let mut config = RegistrarConfig::new("http://cfg.test", "relay");
        config.host = "relay-01".to_string();
        config.avg_metric_volume = 42;

        let payload = config.payload();
        assert_eq!(payload.metric_prefix(), "relay");
        assert_eq!(payload.host(), "relay-01");
        assert_eq!(payload.avg_metric_volume(), 42);
        assert_eq!(payload.env(), "prd");
        assert_eq!(payload.infrastructure(), "1P");
    }
}
