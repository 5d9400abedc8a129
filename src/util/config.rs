//! User settings for nova.
//!
//! Settings are read from two places:
//! - Global: `~/.nova/config.toml` - User-wide defaults
//! - Project: `.nova/config.toml` - Project-specific overrides
//!
//! Project settings take precedence over global settings, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Merged user settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Build settings
    pub build: BuildSettings,

    /// Toolchain overrides
    pub toolchain: ToolchainSettings,
}

/// Build-related settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildSettings {
    /// Number of parallel jobs (None = available parallelism)
    pub jobs: Option<usize>,

    /// Per-recipe timeout in seconds
    pub timeout: Option<u64>,

    /// `human` or `json`
    pub message_format: Option<String>,
}

/// Explicit tool paths, used before `CC`/`CXX`/`AR` and `PATH` lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    pub cc: Option<PathBuf>,
    pub cxx: Option<PathBuf>,
    pub ar: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load settings, falling back to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another set of settings into this one (other takes precedence).
    pub fn merge(&mut self, other: Settings) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.timeout.is_some() {
            self.build.timeout = other.build.timeout;
        }
        if other.build.message_format.is_some() {
            self.build.message_format = other.build.message_format;
        }

        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if other.toolchain.cxx.is_some() {
            self.toolchain.cxx = other.toolchain.cxx;
        }
        if other.toolchain.ar.is_some() {
            self.toolchain.ar = other.toolchain.ar;
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.build.timeout.map(Duration::from_secs)
    }
}

/// Get the global nova config directory (~/.nova).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".nova"))
}

/// Get the project config path (.nova/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".nova").join("config.toml")
}

/// Load merged settings from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.nova/config.toml)
/// 2. Global config (~/.nova/config.toml)
/// 3. Defaults
pub fn load_settings(global_path: Option<&Path>, project_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Some(global_path) = global_path {
        settings.merge(Settings::load_or_default(global_path));
    }
    settings.merge(Settings::load_or_default(project_path));

    settings
}
