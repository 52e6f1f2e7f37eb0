//! Application configuration management.
//!
//! This module handles loading and saving the configuration: where snapshots
//! are stored, how old a snapshot may get, how often `watch` refreshes and
//! which upstream endpoints to use.
//!
//! Configuration is stored at `~/.config/vatcache/config.json`. Environment
//! variables (`VATCACHE_DATA_DIR`, `VATCACHE_STALE_SECS`, `VATCACHE_DATA_URL`)
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, VatsimClient, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::cache::DEFAULT_STALE_AFTER_SECS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "vatcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Interval between unconditional refreshes in watch mode.
/// Matches the staleness threshold so watchers see every snapshot.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

pub const ENV_DATA_DIR: &str = "VATCACHE_DATA_DIR";
pub const ENV_STALE_SECS: &str = "VATCACHE_STALE_SECS";
pub const ENV_DATA_URL: &str = "VATCACHE_DATA_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub stale_after_secs: Option<u64>,
    pub refresh_interval_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub status_url: Option<String>,
    /// Fixed mirror list; when empty mirrors are discovered from the status document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_urls: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|s| !s.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup(ENV_STALE_SECS).and_then(|s| s.trim().parse().ok()) {
            self.stale_after_secs = Some(secs);
        }
        if let Some(urls) = lookup(ENV_DATA_URL) {
            let urls: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !urls.is_empty() {
                self.data_urls = urls;
            }
        }
    }

    /// Directory holding the current and previous snapshot files.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs.unwrap_or(DEFAULT_STALE_AFTER_SECS))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_secs
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS)
                .max(1),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Build the upstream client described by this configuration.
    pub fn build_client(&self) -> Result<VatsimClient, ApiError> {
        let mut client = VatsimClient::with_timeout(self.request_timeout())?
            .with_data_urls(self.data_urls.clone());
        if let Some(ref url) = self.status_url {
            client = client.with_status_url(url.clone());
        }
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.stale_after(), Duration::from_secs(60));
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config =
            serde_json::from_str(r#"{"stale_after_secs": 120, "data_dir": "/tmp/vat"}"#).unwrap();
        assert_eq!(config.stale_after(), Duration::from_secs(120));
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/vat"));
        assert!(config.data_urls.is_empty());
    }

    #[test]
    fn test_refresh_interval_never_zero() {
        let config = Config {
            refresh_interval_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DATA_DIR, "/var/cache/vat"),
            (ENV_STALE_SECS, " 90 "),
            (ENV_DATA_URL, "http://a/data.json, http://b/data.json,"),
        ]);
        let mut config = Config::default();
        config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, Some(PathBuf::from("/var/cache/vat")));
        assert_eq!(config.stale_after_secs, Some(90));
        assert_eq!(
            config.data_urls,
            vec!["http://a/data.json".to_string(), "http://b/data.json".to_string()]
        );
    }

    #[test]
    fn test_env_ignores_garbage() {
        let mut config = Config {
            stale_after_secs: Some(30),
            ..Default::default()
        };
        config.apply_env_from(|key| (key == ENV_STALE_SECS).then(|| "soon".to_string()));
        assert_eq!(config.stale_after_secs, Some(30));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            stale_after_secs: Some(15),
            data_urls: vec!["http://mirror/data.json".into()],
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_build_client_uses_status_url() {
        let config = Config {
            status_url: Some("http://localhost/status.json".into()),
            ..Default::default()
        };
        let client = config.build_client().unwrap();
        assert_eq!(client.status_url(), "http://localhost/status.json");
    }
}
