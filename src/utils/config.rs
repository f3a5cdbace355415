use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::web::BrowserType;
use crate::runner::ResolverConfig;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Macro store document
    pub store_path: PathBuf,

    /// Locator lookups per step before giving up
    pub locator_attempts: u32,

    /// First backoff between lookups (ms)
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (ms)
    pub max_backoff_ms: u64,

    /// Settle pause after each dispatched step (ms)
    pub step_delay_ms: u64,

    /// Capture queue poll interval while recording (ms)
    pub capture_poll_ms: u64,

    pub browser: BrowserType,

    pub headless: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_home().join("macros.json"),
            locator_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 2000,
            step_delay_ms: 100,
            capture_poll_ms: 250,
            browser: BrowserType::Chromium,
            headless: false,
        }
    }
}

impl Config {
    /// Load `path` (or the default config file when present), then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_home().join("config.yaml");
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(store) = var("LUMI_MACRO_STORE").filter(|v| !v.is_empty()) {
            self.store_path = PathBuf::from(store);
        }
        if let Some(headless) = var("LUMI_HEADLESS") {
            self.headless = headless == "true" || headless == "1";
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_attempts: self.locator_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
        }
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn capture_poll(&self) -> Duration {
        Duration::from_millis(self.capture_poll_ms.max(1))
    }
}

/// `~/.lumi-macro`, falling back to the working directory without a home
fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lumi-macro")
}
