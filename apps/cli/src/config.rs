//! CLI configuration.

use std::{env, path::PathBuf, time::Duration};

use auth::{DEFAULT_LATENCY, DEFAULT_SESSION_SLOT, StoreConfig};

/// Configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the persisted session.
    pub data_dir: PathBuf,
    /// Simulated signup/signin latency.
    pub auth_latency: Duration,
    /// Storage slot for the session snapshot.
    pub session_slot: String,
    /// Log level.
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let data_dir = match lookup("DISCOVERYAI_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .map(|p| p.join(".discoveryai"))
                .ok_or_else(|| {
                    anyhow::anyhow!("Home directory not found; set DISCOVERYAI_DATA_DIR")
                })?,
        };

        let auth_latency = lookup("DISCOVERYAI_AUTH_LATENCY_MS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_LATENCY);

        Ok(Self {
            data_dir,
            auth_latency,
            session_slot: lookup("DISCOVERYAI_SESSION_SLOT")
                .unwrap_or_else(|| DEFAULT_SESSION_SLOT.to_string()),
            log_level: lookup("DISCOVERYAI_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Returns the session store configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new()
            .with_latency(self.auth_latency)
            .with_slot(self.session_slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DISCOVERYAI_DATA_DIR", "/tmp/d")])).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/d"));
        assert_eq!(config.auth_latency, DEFAULT_LATENCY);
        assert_eq!(config.session_slot, DEFAULT_SESSION_SLOT);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DISCOVERYAI_DATA_DIR", "/tmp/d"),
            ("DISCOVERYAI_AUTH_LATENCY_MS", "25"),
            ("DISCOVERYAI_SESSION_SLOT", "other"),
            ("DISCOVERYAI_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        let store_config = config.store_config();
        assert_eq!(store_config.latency, Duration::from_millis(25));
        assert_eq!(store_config.slot, "other");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_bad_latency_falls_back() {
        let config = Config::from_lookup(lookup(&[
            ("DISCOVERYAI_DATA_DIR", "/tmp/d"),
            ("DISCOVERYAI_AUTH_LATENCY_MS", "soon"),
        ]))
        .unwrap();
        assert_eq!(config.auth_latency, DEFAULT_LATENCY);
    }
}
