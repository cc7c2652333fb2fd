//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! where the catalog lives, which menu section to show, cache timings and
//! cart behaviour.
//!
//! Configuration is stored at `~/.config/menucart/config.json`. The
//! `MENUCART_CATALOG_URL` and `MENUCART_SECTION` environment variables
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::CacheSettings;
use crate::cart::{CartConfig, MergeKey, CART_STORAGE_KEY, DEFAULT_PLACEHOLDER_IMAGE, DEFAULT_PLACEHOLDER_NAME};

/// Application name used for config/data directory paths
const APP_NAME: &str = "menucart";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_CATALOG_URL: &str = "MENUCART_CATALOG_URL";
const ENV_SECTION: &str = "MENUCART_SECTION";

const DEFAULT_SECTION: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog_url: Option<String>,
    pub section: String,
    pub freshness_minutes: u64,
    pub dedup_seconds: u64,
    pub refresh_minutes: u64,
    pub merge_key: MergeKey,
    pub placeholder_name: String,
    pub placeholder_image: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_url: None,
            section: DEFAULT_SECTION.to_string(),
            freshness_minutes: 60,
            dedup_seconds: 60,
            refresh_minutes: 60,
            merge_key: MergeKey::default(),
            placeholder_name: DEFAULT_PLACEHOLDER_NAME.to_string(),
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
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
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in practice).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_CATALOG_URL).filter(|v| !v.trim().is_empty()) {
            self.catalog_url = Some(url);
        }
        if let Some(section) = lookup(ENV_SECTION).filter(|v| !v.trim().is_empty()) {
            self.section = section;
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted cart and catalog cache.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            freshness: Duration::from_secs(self.freshness_minutes.saturating_mul(60)),
            dedup_window: Duration::from_secs(self.dedup_seconds),
            // A zero period would make tokio's interval panic
            refresh_interval: Duration::from_secs(self.refresh_minutes.max(1).saturating_mul(60)),
        }
    }

    pub fn cart_config(&self) -> CartConfig {
        CartConfig {
            storage_key: CART_STORAGE_KEY.to_string(),
            merge_key: self.merge_key,
            placeholder_name: self.placeholder_name.clone(),
            placeholder_image: self.placeholder_image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_settings(), CacheSettings::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menucart").join("config.json");
        let config = Config {
            catalog_url: Some("https://catalog.example.com".to_string()),
            merge_key: MergeKey::Id,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"section": "breakfast", "merge_key": "id"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.section, "breakfast");
        assert_eq!(config.merge_key, MergeKey::Id);
        assert_eq!(config.refresh_minutes, 60);
        assert_eq!(config.cart_config().merge_key, MergeKey::Id);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            "MENUCART_CATALOG_URL" => Some("https://env.example.com".to_string()),
            "MENUCART_SECTION" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.catalog_url.as_deref(), Some("https://env.example.com"));
        assert_eq!(config.section, DEFAULT_SECTION);
    }

    #[test]
    fn test_zero_refresh_is_clamped() {
        let config = Config {
            refresh_minutes: 0,
            dedup_seconds: 5,
            ..Config::default()
        };
        let settings = config.cache_settings();
        assert_eq!(settings.refresh_interval, Duration::from_secs(60));
        assert_eq!(settings.dedup_window, Duration::from_secs(5));
    }
}
