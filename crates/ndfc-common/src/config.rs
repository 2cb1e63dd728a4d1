//! Controller connection settings and config-file loading.
//!
//! Connection settings are loaded from a YAML file and may be overridden
//! by environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `NDFC_IP4` | `ip` |
//! | `NDFC_USERNAME` | `username` |
//! | `NDFC_PASSWORD` | `password` |
//! | `NDFC_DOMAIN` | `domain` |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{NdfcError, NdfcResult};

/// Environment variable holding the controller address.
pub const ENV_IP4: &str = "NDFC_IP4";
/// Environment variable holding the login user.
pub const ENV_USERNAME: &str = "NDFC_USERNAME";
/// Environment variable holding the login password.
pub const ENV_PASSWORD: &str = "NDFC_PASSWORD";
/// Environment variable holding the login domain.
pub const ENV_DOMAIN: &str = "NDFC_DOMAIN";

/// Connection settings for one controller.
#[derive(Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Controller IPv4 address or hostname
    #[serde(default)]
    pub ip: String,

    /// Login user
    #[serde(default)]
    pub username: String,

    /// Login password
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Login domain
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Verify the controller's TLS certificate
    #[serde(default)]
    pub verify_tls: bool,

    /// URL scheme; plain http is for lab controllers behind a proxy
    #[serde(default)]
    pub scheme: Scheme,

    /// Total time in seconds RestSend keeps retrying a request
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Seconds to wait between retries
    #[serde(default = "default_send_interval")]
    pub send_interval_secs: u64,

    /// Number of requests kept in the sender history
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

/// URL scheme used to reach the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

fn default_domain() -> String {
    "local".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_send_interval() -> u64 {
    5
}

fn default_history_size() -> usize {
    50
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ip: String::new(),
            username: String::new(),
            password: String::new(),
            domain: default_domain(),
            verify_tls: false,
            scheme: Scheme::Https,
            timeout_secs: default_timeout(),
            send_interval_secs: default_send_interval(),
            history_size: default_history_size(),
        }
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("ip", &self.ip)
            .field("username", &self.username)
            .field("password", &"********")
            .field("domain", &self.domain)
            .field("verify_tls", &self.verify_tls)
            .field("scheme", &self.scheme)
            .field("timeout_secs", &self.timeout_secs)
            .field("send_interval_secs", &self.send_interval_secs)
            .field("history_size", &self.history_size)
            .finish()
    }
}

impl ControllerConfig {
    /// Loads settings from an optional YAML file, then applies environment
    /// overrides and validates the result.
    pub fn load(path: Option<&Path>) -> NdfcResult<Self> {
        let mut config = match path {
            Some(path) => load_config_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a variable lookup (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(ip) = get(ENV_IP4) {
            self.ip = ip;
        }
        if let Some(username) = get(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.password = password;
        }
        if let Some(domain) = get(ENV_DOMAIN) {
            self.domain = domain;
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> NdfcResult<()> {
        if self.ip.is_empty() {
            return Err(NdfcError::invalid_config(
                "ip",
                format!("controller address is required (set it in the config file or {})", ENV_IP4),
            ));
        }
        if self.username.is_empty() {
            return Err(NdfcError::invalid_config(
                "username",
                format!("username is required (set it in the config file or {})", ENV_USERNAME),
            ));
        }
        if self.password.is_empty() {
            return Err(NdfcError::invalid_config(
                "password",
                format!("password is required (set it in the config file or {})", ENV_PASSWORD),
            ));
        }
        if self.send_interval_secs > self.timeout_secs {
            return Err(NdfcError::invalid_config(
                "send_interval_secs",
                "must not exceed timeout_secs",
            ));
        }
        Ok(())
    }

    /// Base URL of the controller.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.ip)
    }

    /// Retry timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry interval as a Duration.
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }
}

/// Loads a YAML or JSON file into `T`.
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML.
pub fn load_config_file<T: DeserializeOwned>(path: &Path) -> NdfcResult<T> {
    let contents = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        Ok(serde_json::from_str(&contents)?)
    } else {
        Ok(serde_yaml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.domain, "local");
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.send_interval_secs, 5);
        assert_eq!(config.history_size, 50);
        assert!(!config.verify_tls);
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let file = write_temp(".yaml", "ip: 192.168.1.1\nusername: admin\npassword: secret\n");
        let config: ControllerConfig = load_config_file(file.path()).unwrap();
        assert_eq!(config.ip, "192.168.1.1");
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "secret");
        assert_eq!(config.domain, "local");
        assert_eq!(config.base_url(), "https://192.168.1.1");
    }

    #[test]
    fn test_load_json() {
        let file = write_temp(
            ".json",
            r#"{"ip": "10.1.1.1", "username": "u", "password": "p", "timeout_secs": 60}"#,
        );
        let config: ControllerConfig = load_config_file(file.path()).unwrap();
        assert_eq!(config.ip, "10.1.1.1");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_load_missing_file() {
        let result: NdfcResult<ControllerConfig> =
            load_config_file(Path::new("/nonexistent/ndfc.yaml"));
        assert!(matches!(result, Err(NdfcError::Io(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_IP4, "172.22.150.244"),
            (ENV_USERNAME, "admin"),
            (ENV_PASSWORD, "pw"),
            (ENV_DOMAIN, ""),
        ]
        .into_iter()
        .collect();

        let mut config = ControllerConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.ip, "172.22.150.244");
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "pw");
        // Empty override leaves the default in place
        assert_eq!(config.domain, "local");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_fields() {
        let config = ControllerConfig::default();
        match config.validate() {
            Err(NdfcError::InvalidConfig { field, .. }) => assert_eq!(field, "ip"),
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ControllerConfig {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
    }
}
