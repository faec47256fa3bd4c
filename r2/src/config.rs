//! Configuration management for r2.
//!
//! Loads configuration from a TOML file with environment variable overrides.
//! Every key is optional; a missing file means all defaults.

use crate::utils::{R2Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the r2 home directory.
pub const HOME_ENV: &str = "R2_HOME";

/// Environment variable overriding the configured log level.
pub const LOG_ENV: &str = "R2_LOG";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory holding the manifest and content store
    #[serde(skip)]
    pub home: PathBuf,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub restore: RestoreConfig,

    #[serde(default)]
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also append log lines to this file (relative paths are under the home)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Snapshot the live file before overwriting it
    #[serde(default = "default_backup_first")]
    pub backup_first: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Directory `install` copies executables into (default: `<home>/bin`)
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
}

// Default values
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_backup_first() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            backup_first: default_backup_first(),
        }
    }
}

impl Config {
    /// Resolve the configuration for this invocation.
    ///
    /// An explicit `path` must exist. Otherwise `<home>/config.toml` is read
    /// when present. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let home = default_home()?;

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let candidate = home.join(CONFIG_FILE);
                if candidate.is_file() {
                    Self::from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        config.home = home;

        if let Ok(level) = std::env::var(LOG_ENV) {
            if !level.is_empty() {
                config.log.level = level;
            }
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            R2Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| R2Error::Config(format!("{}: {}", path.display(), e)))
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Configuration rooted at an explicit home, with defaults elsewhere.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ..Self::default()
        }
    }

    /// Log file to append to, if one is configured.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log.file.as_deref().map(|file| self.home.join(expand_tilde(file)))
    }

    /// Directory `install` writes to.
    pub fn bin_dir(&self) -> PathBuf {
        match &self.install.bin_dir {
            Some(dir) => expand_tilde(dir),
            None => self.home.join("bin"),
        }
    }
}

/// `$R2_HOME`, else `~/.r2`.
fn default_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.is_empty() {
            return Ok(expand_tilde(Path::new(&home)));
        }
    }
    dirs::home_dir()
        .map(|h| h.join(".r2"))
        .ok_or_else(|| R2Error::Config("cannot determine home directory".to_string()))
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
