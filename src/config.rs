//! Runtime configuration read from environment variables.
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::alerting::{DEFAULT_NOTIFICATION_CAPACITY, ThresholdConfig};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::transport::{
    DEFAULT_API_VERSION, DEFAULT_CLI, DEFAULT_COMPOSE_LEGACY_CLI, DEFAULT_SOCKET_PATH, Endpoint,
};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for environment variable `{var}`")]
    InvalidValue { var: &'static str, value: String },
    #[error("invalid thresholds: {0}")]
    Thresholds(#[from] crate::alerting::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub endpoint: Endpoint,
    pub api_version: String,
    pub cli: String,
    pub compose_legacy_cli: String,
    /// Upper bound for a single socket request or CLI invocation.
    pub command_timeout: Duration,
    /// Upper bound for the delivery to a single notification channel.
    pub channel_timeout: Duration,
    pub thresholds: ThresholdConfig,
    pub history_capacity: usize,
    pub notification_capacity: usize,
    pub poll_interval: Duration,
    pub channels_file: Option<PathBuf>,
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            api_version: DEFAULT_API_VERSION.to_owned(),
            cli: DEFAULT_CLI.to_owned(),
            compose_legacy_cli: DEFAULT_COMPOSE_LEGACY_CLI.to_owned(),
            command_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            channel_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            thresholds: ThresholdConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            channels_file: None,
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for the first variable that cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(lookup);
        let defaults = Self::default();

        let tls = env.flag("DOCKER_TLS", false)?;
        let endpoint = match env.get("DOCKER_HOST") {
            Some(host) => parse_docker_host(&host, tls)?,
            None => Endpoint::Unix(
                env.get("DOCKER_SOCKET")
                    .unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_owned())
                    .into(),
            ),
        };

        let thresholds = ThresholdConfig {
            enabled: env.flag("ALERTS_ENABLED", defaults.thresholds.enabled)?,
            cpu_threshold: env.parse("CPU_THRESHOLD", defaults.thresholds.cpu_threshold)?,
            memory_threshold: env
                .parse("MEMORY_THRESHOLD", defaults.thresholds.memory_threshold)?,
            notify_on_start: env.flag("NOTIFY_ON_START", defaults.thresholds.notify_on_start)?,
            notify_on_stop: env.flag("NOTIFY_ON_STOP", defaults.thresholds.notify_on_stop)?,
        };
        thresholds.validate()?;

        Ok(Self {
            endpoint,
            api_version: env
                .get("DOCKER_API_VERSION")
                .unwrap_or(defaults.api_version),
            cli: env.get("DOCKER_CLI").unwrap_or(defaults.cli),
            compose_legacy_cli: env
                .get("COMPOSE_LEGACY_CLI")
                .unwrap_or(defaults.compose_legacy_cli),
            command_timeout: env.seconds("COMMAND_TIMEOUT_SECS", defaults.command_timeout)?,
            channel_timeout: env.seconds("CHANNEL_TIMEOUT_SECS", defaults.channel_timeout)?,
            thresholds,
            history_capacity: env.parse("HISTORY_CAPACITY", defaults.history_capacity)?,
            notification_capacity: env
                .parse("NOTIFICATION_CAPACITY", defaults.notification_capacity)?,
            poll_interval: env.seconds("POLL_INTERVAL_SECS", defaults.poll_interval)?,
            channels_file: env.get("CHANNELS_FILE").map(PathBuf::from),
            listen_addr: env.get("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// The trimmed value of `var`; empty values count as unset.
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, var: &'static str, default: T) -> Result<T> {
        match self.get(var) {
            Some(value) => value
                .parse()
                .map_err(|_| Error::InvalidValue { var, value }),
            None => Ok(default),
        }
    }

    fn flag(&self, var: &'static str, default: bool) -> Result<bool> {
        let Some(value) = self.get(var) else {
            return Ok(default);
        };
        match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::InvalidValue { var, value }),
        }
    }

    fn seconds(&self, var: &'static str, default: Duration) -> Result<Duration> {
        let secs = self.parse(var, default.as_secs())?;
        if secs == 0 {
            return Err(Error::InvalidValue {
                var,
                value: secs.to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }
}

/// Parses `tcp://host[:port]` or `unix:///path`.
///
/// Without an explicit port, TCP endpoints use `2376` with TLS and `2375` without.
fn parse_docker_host(value: &str, tls: bool) -> Result<Endpoint> {
    let invalid = || Error::InvalidValue {
        var: "DOCKER_HOST",
        value: value.to_owned(),
    };

    if let Some(path) = value.strip_prefix("unix://") {
        if path.is_empty() {
            return Err(invalid());
        }
        return Ok(Endpoint::Unix(path.into()));
    }

    let address = value.strip_prefix("tcp://").ok_or_else(invalid)?;
    let address = address.trim_end_matches('/');
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
        None => (address, if tls { 2376 } else { 2375 }),
    };
    if host.is_empty() {
        return Err(invalid());
    }

    Ok(Endpoint::Tcp {
        host: host.to_owned(),
        port,
        tls,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.endpoint,
            Endpoint::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(config.history_capacity, 60);
        assert_eq!(config.notification_capacity, 100);
        assert_eq!(config.command_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DOCKER_SOCKET", "/run/user/1000/docker.sock"),
            ("CPU_THRESHOLD", "90.5"),
            ("NOTIFY_ON_STOP", "no"),
            ("HISTORY_CAPACITY", "120"),
            ("CHANNELS_FILE", "/etc/dockwatch/channels.json"),
            ("POLL_INTERVAL_SECS", " 5 "),
        ])
        .unwrap();
        assert_eq!(
            config.endpoint,
            Endpoint::Unix(PathBuf::from("/run/user/1000/docker.sock"))
        );
        assert_eq!(config.thresholds.cpu_threshold, 90.5);
        assert!(!config.thresholds.notify_on_stop);
        assert_eq!(config.history_capacity, 120);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(
            config.channels_file,
            Some(PathBuf::from("/etc/dockwatch/channels.json"))
        );
    }

    #[test]
    fn test_docker_host() {
        assert_eq!(
            parse_docker_host("tcp://10.0.0.5:2375", false).unwrap(),
            Endpoint::Tcp {
                host: "10.0.0.5".to_owned(),
                port: 2375,
                tls: false
            }
        );
        assert_eq!(
            parse_docker_host("tcp://docker.internal", true).unwrap(),
            Endpoint::Tcp {
                host: "docker.internal".to_owned(),
                port: 2376,
                tls: true
            }
        );
        assert_eq!(
            parse_docker_host("unix:///tmp/docker.sock", false).unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/docker.sock"))
        );
        assert!(parse_docker_host("ssh://host", false).is_err());
        assert!(parse_docker_host("tcp://host:port", false).is_err());

        let config = config(&[("DOCKER_HOST", "tcp://remote:2376"), ("DOCKER_TLS", "1")]).unwrap();
        assert_eq!(config.endpoint.to_string(), "https://remote:2376");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("CPU_THRESHOLD", "high")]),
            Err(Error::InvalidValue {
                var: "CPU_THRESHOLD",
                ..
            })
        ));
        assert!(matches!(
            config(&[("MEMORY_THRESHOLD", "150")]),
            Err(Error::Thresholds(_))
        ));
        assert!(config(&[("ALERTS_ENABLED", "maybe")]).is_err());
        assert!(config(&[("COMMAND_TIMEOUT_SECS", "0")]).is_err());
    }
}
