//! Application configuration management.
//!
//! Holds the document store project, its web API key, the last email used
//! to sign in and the cache staleness window. Stored at
//! `~/.config/alithia/config.json`; `ALITHIA_PROJECT_ID` and
//! `ALITHIA_API_KEY` override the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "alithia";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Collections older than this are reloaded before use
pub const DEFAULT_STALE_MINUTES: i64 = 60;

/// Upper bound on the configured staleness window (one year)
pub const MAX_STALE_MINUTES: i64 = 60 * 24 * 365;

const PROJECT_ENV: &str = "ALITHIA_PROJECT_ID";
const API_KEY_ENV: &str = "ALITHIA_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub last_email: Option<String>,
    pub stale_minutes: Option<i64>,
}

impl Config {
    /// Load from the default path, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Remember the sign-in email without writing environment overrides
    /// back to the file.
    pub fn remember_email(email: &str) -> Result<()> {
        let path = Self::config_path()?;
        let mut stored = Self::load_from(&path)?;
        stored.last_email = Some(email.to_string());
        stored.save_to(&path)
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(project) = lookup(PROJECT_ENV).filter(|v| !v.is_empty()) {
            self.project_id = Some(project);
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.api_key = Some(key);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the saved session.
    pub fn session_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Project id and API key, or an error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let project = self
            .project_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No project configured (set {})", PROJECT_ENV))?;
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No API key configured (set {})", API_KEY_ENV))?;
        Ok((project, key))
    }

    /// The staleness window, clamped to `0..=MAX_STALE_MINUTES`.
    pub fn stale_after(&self) -> chrono::Duration {
        let minutes = self
            .stale_minutes
            .unwrap_or(DEFAULT_STALE_MINUTES)
            .clamp(0, MAX_STALE_MINUTES);
        chrono::Duration::minutes(minutes)
    }
}
