/*!
 * Runtime settings for the agent process
 *
 * These are process-level knobs (file locations, logging, restart budget),
 * separate from the versioned configuration document the agent maintains.
 * They come from an optional TOML file and are then overridden by CLI flags.
 */

use crate::config::FsStorage;
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main settings for an agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Primary configuration document
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Single rotating backup of the previous document
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,

    /// Shipped template, used for migration and first-run setup
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,

    /// Well-known URL probed to detect connectivity
    #[serde(default = "default_probe_url")]
    pub probe_url: String,

    #[serde(default = "default_probe_connect_timeout")]
    pub probe_connect_timeout_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Runs attempted in total before giving up after crashes
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Stop after this many cycles (0 = run forever)
    #[serde(default)]
    pub max_cycles: u64,

    /// Allow the interactive first-run wizard
    #[serde(default = "default_true")]
    pub interactive: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            backup_path: default_backup_path(),
            template_path: default_template_path(),
            probe_url: default_probe_url(),
            probe_connect_timeout_secs: default_probe_connect_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            max_restarts: default_max_restarts(),
            max_cycles: 0,
            interactive: true,
            log_level: LogLevel::Debug,
            log_file: None,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    #[default]
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_config_path() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_backup_path() -> PathBuf {
    PathBuf::from("config.bak")
}

fn default_template_path() -> PathBuf {
    PathBuf::from("config.example.json")
}

fn default_probe_url() -> String {
    "https://github.com/stefan2200/TWB".to_string()
}

fn default_probe_connect_timeout() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    60
}

fn default_max_restarts() -> u32 {
    3
}

impl RuntimeSettings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| AgentError::Settings(format!("{}: {}", path.display(), e)))
    }

    /// Save settings to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AgentError::Settings(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn storage(&self) -> FsStorage {
        FsStorage::new(&self.config_path, &self.backup_path, &self.template_path)
    }

    pub fn probe_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_connect_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
