//! Engine configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Prefix prepended to every fetched file path.
    pub base: String,
    /// Appended to fetched paths as a `cb` query parameter when set.
    pub cache_buster: Option<String>,
    /// Fail `load` on names no resource or definition knows about.
    pub strict: bool,
    /// Regex patterns for names that stay lenient even in strict mode.
    pub exceptions: Vec<String>,
    /// Arm the stall watchdog.
    pub watchdog: bool,
    /// Watchdog timeout for a single stalled step, in milliseconds.
    pub timeout_ms: u64,
    /// Narrow timeout reports down to the blocking modules and resources.
    pub diagnose: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base: String::new(),
            cache_buster: None,
            strict: true,
            exceptions: Vec::new(),
            watchdog: true,
            timeout_ms: 7_000,
            diagnose: true,
        }
    }
}

impl LoaderConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// `None` when the watchdog is disabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.watchdog.then(|| Duration::from_millis(self.timeout_ms))
    }

    /// The path handed to the file loader for a registered resource.
    pub fn resolve_path(&self, file_path: &str) -> String {
        let mut path = format!("{}{}", self.base, file_path);
        if let Some(cb) = &self.cache_buster {
            let sep = if path.contains('?') { '&' } else { '?' };
            path.push(sep);
            path.push_str("cb=");
            path.push_str(cb);
        }
        path
    }
}
