//! Configuration for a tasks peer.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Transports to switch off. Everything is on by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportToggles {
    pub disable_ble: bool,
    pub disable_lan: bool,
    pub disable_awdl: bool,
    pub disable_wifi_aware: bool,
}

/// Settings needed to construct a [`TasksPeer`](crate::TasksPeer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConfig {
    /// App id from the sync service portal
    pub app_id: String,
    /// Online playground token
    pub token: String,
    #[serde(default = "default_true")]
    pub enable_cloud_sync: bool,
    /// Where the store is persisted. `None` keeps it in memory.
    #[serde(default)]
    pub persistence_dir: Option<PathBuf>,
    #[serde(default)]
    pub custom_auth_url: Option<String>,
    #[serde(default)]
    pub websocket_url: Option<String>,
    #[serde(default)]
    pub transports: TransportToggles,
}

fn default_true() -> bool {
    true
}

impl PeerConfig {
    pub fn new(app_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            token: token.into(),
            enable_cloud_sync: true,
            persistence_dir: None,
            custom_auth_url: None,
            websocket_url: None,
            transports: TransportToggles::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let flag = |name: &'static str, default: bool| match lookup(name) {
            Some(value) => parse_bool(name, &value),
            None => Ok(default),
        };

        Ok(Self {
            app_id: required("SYNC_APP_ID")?,
            token: required("SYNC_PLAYGROUND_TOKEN")?,
            enable_cloud_sync: flag("SYNC_ENABLE_CLOUD_SYNC", true)?,
            persistence_dir: lookup("SYNC_PERSISTENCE_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            custom_auth_url: lookup("SYNC_AUTH_URL").filter(|url| !url.is_empty()),
            websocket_url: lookup("SYNC_WEBSOCKET_URL").filter(|url| !url.is_empty()),
            transports: TransportToggles {
                disable_ble: flag("SYNC_DISABLE_BLE", false)?,
                disable_lan: flag("SYNC_DISABLE_LAN", false)?,
                disable_awdl: flag("SYNC_DISABLE_AWDL", false)?,
                disable_wifi_aware: flag("SYNC_DISABLE_WIFI_AWARE", false)?,
            },
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var: name,
            value: value.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid boolean value {value:?} for {var}")]
    InvalidBool { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn minimal_environment() {
        let config = PeerConfig::from_lookup(lookup(&[
            ("SYNC_APP_ID", "app"),
            ("SYNC_PLAYGROUND_TOKEN", "token"),
        ]))
        .unwrap();
        assert_eq!(config, PeerConfig::new("app", "token"));
    }

    #[test]
    fn full_environment() {
        let config = PeerConfig::from_lookup(lookup(&[
            ("SYNC_APP_ID", "app"),
            ("SYNC_PLAYGROUND_TOKEN", "token"),
            ("SYNC_ENABLE_CLOUD_SYNC", "false"),
            ("SYNC_PERSISTENCE_DIR", "/tmp/tasks"),
            ("SYNC_AUTH_URL", "https://auth.example.com"),
            ("SYNC_WEBSOCKET_URL", "wss://sync.example.com"),
            ("SYNC_DISABLE_BLE", "1"),
            ("SYNC_DISABLE_AWDL", "YES"),
        ]))
        .unwrap();

        assert!(!config.enable_cloud_sync);
        assert_eq!(config.persistence_dir, Some(PathBuf::from("/tmp/tasks")));
        assert_eq!(config.custom_auth_url.as_deref(), Some("https://auth.example.com"));
        assert_eq!(config.websocket_url.as_deref(), Some("wss://sync.example.com"));
        assert_eq!(
            config.transports,
            TransportToggles {
                disable_ble: true,
                disable_lan: false,
                disable_awdl: true,
                disable_wifi_aware: false,
            }
        );
    }

    #[test]
    fn missing_required_variables() {
        let err = PeerConfig::from_lookup(lookup(&[("SYNC_PLAYGROUND_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SYNC_APP_ID")));

        let err = PeerConfig::from_lookup(lookup(&[("SYNC_APP_ID", "a"), ("SYNC_PLAYGROUND_TOKEN", " ")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SYNC_PLAYGROUND_TOKEN")));
    }

    #[test]
    fn invalid_boolean() {
        let err = PeerConfig::from_lookup(lookup(&[
            ("SYNC_APP_ID", "a"),
            ("SYNC_PLAYGROUND_TOKEN", "t"),
            ("SYNC_DISABLE_LAN", "maybe"),
        ]))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid boolean value \"maybe\" for SYNC_DISABLE_LAN"
        );
    }

    #[test]
    fn json_defaults() {
        let config: PeerConfig =
            serde_json::from_str(r#"{"appId": "app", "token": "token"}"#).unwrap();
        assert_eq!(config, PeerConfig::new("app", "token"));

        let config: PeerConfig = serde_json::from_str(
            r#"{"appId": "app", "token": "t", "enableCloudSync": false, "transports": {"disableLan": true}}"#,
        )
        .unwrap();
        assert!(!config.enable_cloud_sync);
        assert!(config.transports.disable_lan);
    }
}
