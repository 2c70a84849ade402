use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HeraldError, Result};
use crate::types::{ChannelId, UserId};

/// Top-level configuration for the Herald runtime.
///
/// Loaded from `~/.herald/config.toml` by default. Each section corresponds
/// to one concern of the runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub developers: DevelopersConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl HeraldConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HeraldConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HeraldError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Developer allow-list and developer-facing sinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevelopersConfig {
    /// Users allowed to invoke `dev_only` actions.
    pub ids: Vec<UserId>,
    /// Channel receiving flushed debug reports. Reports only go to the log
    /// when unset.
    pub debug_channel: Option<ChannelId>,
}

impl DevelopersConfig {
    pub fn contains(&self, user: UserId) -> bool {
        self.ids.contains(&user)
    }
}

/// Action discovery and dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Root directory holding one subdirectory per action kind.
    pub root: PathBuf,
    /// Identifiers excluded from loading (actions pending removal).
    pub exceptions: Vec<String>,
    /// Upper bound on a single handler invocation. Unbounded when unset.
    pub handler_timeout_secs: Option<u64>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("actions"),
            exceptions: Vec::new(),
            handler_timeout_secs: None,
        }
    }
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path prefix under which route actions are mounted.
    pub mount: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            mount: "/api".to_string(),
        }
    }
}
