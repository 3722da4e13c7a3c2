//! Runtime settings resolved once from the environment.
//!
//! Nothing below [`Controller`](crate::controller::Controller) reads the
//! environment; the resolved [`Settings`] value is passed down explicitly.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;
use crate::transport::{ConnectParams, SshOptions, TransportKind};

const DEFAULT_DATABASE_URL: &str = "sqlite:oltsync.db?mode=rwc";

/// Uplink candidates probed when port-status discovery yields nothing.
///
/// Candidates are `<prefix>_<shelf>/<slot>/<port>` for every combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkFallback {
    pub prefixes: Vec<String>,
    pub shelf: u32,
    pub slots: Vec<u32>,
    pub ports: Vec<u32>,
}

impl Default for UplinkFallback {
    fn default() -> Self {
        Self {
            prefixes: vec!["gei".to_string(), "xgei".to_string()],
            shelf: 1,
            slots: vec![3, 4],
            ports: vec![1, 2],
        }
    }
}

impl UplinkFallback {
    /// Every candidate interface name, prefix-major.
    pub fn candidates(&self) -> Vec<String> {
        let capacity = self.prefixes.len() * self.slots.len() * self.ports.len();
        let mut names = Vec::with_capacity(capacity);
        for prefix in &self.prefixes {
            for slot in &self.slots {
                for port in &self.ports {
                    names.push(format!("{}_{}/{}/{}", prefix, self.shelf, slot, port));
                }
            }
        }
        names
    }
}

/// Connection defaults for targets without a stored device row.
#[derive(Debug)]
pub struct DeviceDefaults {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub transport: TransportKind,
}

impl DeviceDefaults {
    /// Connection parameters for the default device.
    pub fn connect_params(&self, timeout: Duration) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: SecretString::from(self.password.expose_secret().to_string()),
            kind: self.transport,
            timeout,
            ssh: SshOptions::default(),
        }
    }
}

/// Resolved runtime settings.
#[derive(Debug)]
pub struct Settings {
    /// sqlx connection URL of the store.
    pub database_url: String,

    /// Fallback device when a target has no stored row.
    pub defaults: DeviceDefaults,

    /// Bound for each login stage and each command.
    pub command_timeout: Duration,

    /// Device polls allowed in flight at once.
    pub poll_concurrency: usize,

    /// Uplinks probed when discovery finds none.
    pub uplink_fallback: UplinkFallback,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            defaults: DeviceDefaults {
                host: "127.0.0.1".to_string(),
                port: TransportKind::Telnet.default_port(),
                username: "admin".to_string(),
                password: SecretString::from(String::new()),
                transport: TransportKind::Telnet,
            },
            command_timeout: Duration::from_secs(30),
            poll_concurrency: 2,
            uplink_fallback: UplinkFallback::default(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Settings::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let transport = match get("OLT_TRANSPORT") {
            Some(value) => value
                .parse::<TransportKind>()
                .map_err(|_| invalid("OLT_TRANSPORT", &value))?,
            None => base.defaults.transport,
        };

        let port = match get("OLT_PORT") {
            Some(value) => parse_value::<u16>("OLT_PORT", &value)?,
            None => transport.default_port(),
        };

        let timeout_secs = match get("OLT_COMMAND_TIMEOUT_SECS") {
            Some(value) => positive::<u64>("OLT_COMMAND_TIMEOUT_SECS", &value)?,
            None => base.command_timeout.as_secs(),
        };

        let poll_concurrency = match get("OLT_POLL_CONCURRENCY") {
            Some(value) => positive::<usize>("OLT_POLL_CONCURRENCY", &value)?,
            None => base.poll_concurrency,
        };

        let fallback = base.uplink_fallback;
        let uplink_fallback = UplinkFallback {
            prefixes: match get("OLT_UPLINK_PREFIXES") {
                Some(value) => parse_list::<String>("OLT_UPLINK_PREFIXES", &value)?,
                None => fallback.prefixes,
            },
            shelf: fallback.shelf,
            slots: match get("OLT_UPLINK_SLOTS") {
                Some(value) => parse_list::<u32>("OLT_UPLINK_SLOTS", &value)?,
                None => fallback.slots,
            },
            ports: match get("OLT_UPLINK_PORTS") {
                Some(value) => parse_list::<u32>("OLT_UPLINK_PORTS", &value)?,
                None => fallback.ports,
            },
        };

        Ok(Self {
            database_url: get("OLTSYNC_DATABASE_URL").unwrap_or(base.database_url),
            defaults: DeviceDefaults {
                host: get("OLT_HOST").unwrap_or(base.defaults.host),
                port,
                username: get("OLT_USERNAME").unwrap_or(base.defaults.username),
                password: lookup("OLT_PASSWORD")
                    .map(SecretString::from)
                    .unwrap_or(base.defaults.password),
                transport,
            },
            command_timeout: Duration::from_secs(timeout_secs),
            poll_concurrency,
            uplink_fallback,
        })
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let parsed: T = parse_value(key, value)?;
    if parsed > T::default() {
        Ok(parsed)
    } else {
        Err(invalid(key, value))
    }
}

fn parse_list<T: FromStr>(key: &str, value: &str) -> Result<Vec<T>, ConfigError> {
    let items = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(|_| invalid(key, value)))
        .collect::<Result<Vec<T>, _>>()?;

    if items.is_empty() {
        return Err(invalid(key, value));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[]).unwrap();
        assert_eq!(settings.database_url, "sqlite:oltsync.db?mode=rwc");
        assert_eq!(settings.defaults.host, "127.0.0.1");
        assert_eq!(settings.defaults.port, 23);
        assert_eq!(settings.defaults.username, "admin");
        assert_eq!(settings.defaults.password.expose_secret(), "");
        assert_eq!(settings.defaults.transport, TransportKind::Telnet);
        assert_eq!(settings.command_timeout, Duration::from_secs(30));
        assert_eq!(settings.poll_concurrency, 2);
    }

    #[test]
    fn test_ssh_default_port() {
        let settings = load(&[("OLT_TRANSPORT", "ssh")]).unwrap();
        assert_eq!(settings.defaults.transport, TransportKind::Ssh);
        assert_eq!(settings.defaults.port, 22);

        let settings = load(&[("OLT_TRANSPORT", "ssh"), ("OLT_PORT", "2222")]).unwrap();
        assert_eq!(settings.defaults.port, 2222);
    }

    #[test]
    fn test_overrides() {
        let settings = load(&[
            ("OLT_HOST", "10.0.0.2"),
            ("OLT_PASSWORD", "s3cret"),
            ("OLT_COMMAND_TIMEOUT_SECS", "5"),
            ("OLT_POLL_CONCURRENCY", "8"),
            ("OLT_UPLINK_PREFIXES", "xgei"),
            ("OLT_UPLINK_SLOTS", "10"),
            ("OLT_UPLINK_PORTS", "1, 2, 3"),
        ])
        .unwrap();
        assert_eq!(settings.defaults.host, "10.0.0.2");
        assert_eq!(settings.defaults.password.expose_secret(), "s3cret");
        assert_eq!(settings.command_timeout, Duration::from_secs(5));
        assert_eq!(settings.poll_concurrency, 8);
        assert_eq!(
            settings.uplink_fallback.candidates(),
            vec!["xgei_1/10/1", "xgei_1/10/2", "xgei_1/10/3"]
        );
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(matches!(
            load(&[("OLT_PORT", "telnet")]),
            Err(ConfigError::Invalid { key, .. }) if key == "OLT_PORT"
        ));
        assert!(load(&[("OLT_POLL_CONCURRENCY", "0")]).is_err());
        assert!(load(&[("OLT_COMMAND_TIMEOUT_SECS", "-1")]).is_err());
        assert!(load(&[("OLT_UPLINK_SLOTS", "3,x")]).is_err());
        assert!(load(&[("OLT_TRANSPORT", "serial")]).is_err());
    }

    #[test]
    fn test_default_fallback_candidates() {
        let candidates = UplinkFallback::default().candidates();
        assert_eq!(candidates.len(), 8);
        assert_eq!(candidates[0], "gei_1/3/1");
        assert_eq!(candidates[1], "gei_1/3/2");
        assert_eq!(candidates[2], "gei_1/4/1");
        assert_eq!(candidates[7], "xgei_1/4/2");
    }
}
