//! Taskflow Configuration Module
//!
//! Supplies the identity defaults used when a flow is created without an
//! explicit namespace or version. Config is stored in
//! `~/.config/taskflow/config.toml`:
//!
//! ```toml
//! [flows]
//! default_namespace = "default"
//! default_version = "1"
//! ```
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`TASKFLOW_DEFAULT_NAMESPACE`, `TASKFLOW_DEFAULT_VERSION`)
//! 2. Config file (`~/.config/taskflow/config.toml`)
//! 3. Defaults
//!
//! The process-wide config is resolved from the file and environment on
//! first use; a binary can replace it with [`install`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FlowError, Result};

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_VERSION: &str = "1";

pub const ENV_DEFAULT_NAMESPACE: &str = "TASKFLOW_DEFAULT_NAMESPACE";
pub const ENV_DEFAULT_VERSION: &str = "TASKFLOW_DEFAULT_VERSION";

/// Process-wide configuration consulted by `FlowBuilder::build`
static CURRENT: Lazy<RwLock<Arc<TaskflowConfig>>> =
    Lazy::new(|| RwLock::new(Arc::new(TaskflowConfig::resolve())));

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskflowConfig {
    /// Defaults applied to new flows
    #[serde(default)]
    pub flows: FlowDefaults,
}

/// `[flows]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowDefaults {
    /// Namespace used when a flow is created without one
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Version used when a flow is created without one
    #[serde(default = "default_version")]
    pub default_version: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl Default for FlowDefaults {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            default_version: default_version(),
        }
    }
}

impl TaskflowConfig {
    /// Get the config directory path
    ///
    /// Returns `~/.config/taskflow/` on Unix, `%APPDATA%/taskflow/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("taskflow")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from the default path
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Config file merged with the environment
    ///
    /// An unreadable or malformed file is logged and replaced by defaults.
    pub fn resolve() -> Self {
        Self::load()
            .unwrap_or_else(|e| {
                warn!(error = %e, path = %Self::config_path().display(), "Ignoring config file");
                Self::default()
            })
            .with_env()
    }

    /// Save configuration to an explicit path
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| FlowError::ConfigError {
                    reason: format!("Failed to create config directory: {}", e),
                })?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| FlowError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })?;

        Ok(())
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Self {
        if let Ok(namespace) = std::env::var(ENV_DEFAULT_NAMESPACE) {
            if !namespace.is_empty() {
                self.flows.default_namespace = namespace;
            }
        }

        if let Ok(version) = std::env::var(ENV_DEFAULT_VERSION) {
            if !version.is_empty() {
                self.flows.default_version = version;
            }
        }

        self
    }

    pub fn default_namespace(&self) -> &str {
        &self.flows.default_namespace
    }

    pub fn default_version(&self) -> &str {
        &self.flows.default_version
    }
}

/// Snapshot of the process-wide configuration
pub fn current() -> Arc<TaskflowConfig> {
    Arc::clone(&CURRENT.read())
}

/// Replace the process-wide configuration, returning the previous one
///
/// Flows already built keep the identity they were created with.
pub fn install(config: TaskflowConfig) -> Arc<TaskflowConfig> {
    let mut guard = CURRENT.write();
    std::mem::replace(&mut *guard, Arc::new(config))
}
