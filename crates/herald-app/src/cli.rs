//! CLI argument definitions for the `herald` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use herald_core::{HeraldConfig, HeraldError};

/// Where the effective configuration came from. Reported once tracing is up.
#[derive(Debug)]
pub enum ConfigSource {
    File(PathBuf),
    Missing(PathBuf),
    Invalid(PathBuf, HeraldError),
}

impl ConfigSource {
    pub fn report(&self) {
        match self {
            ConfigSource::File(path) => {
                tracing::info!(path = %path.display(), "Configuration loaded")
            }
            ConfigSource::Missing(path) => {
                tracing::info!(path = %path.display(), "No configuration file, using defaults")
            }
            ConfigSource::Invalid(path, e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load configuration, using defaults"
            ),
        }
    }
}

/// Herald: a chat bot whose commands, components and HTTP routes are
/// declared as action descriptors on disk.
#[derive(Parser, Debug)]
#[command(name = "herald", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Root of the action descriptor tree.
    #[arg(short = 'a', long = "actions-dir")]
    pub actions_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Load and validate the action tree, print a report, then exit.
    #[arg(long = "check")]
    pub check: bool,
}

impl CliArgs {
    /// Priority: --config flag > HERALD_CONFIG env var > ./herald.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("HERALD_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("herald.toml")
    }

    /// Priority: --port flag > HERALD_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("HERALD_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Read the config file and apply the overrides. Nothing is logged here:
    /// this runs before the subscriber exists, so the caller reports the
    /// returned [`ConfigSource`] after `init_tracing`.
    pub fn load_config(&self) -> (HeraldConfig, ConfigSource) {
        let path = self.resolve_config_path();
        let (mut config, source) = if !path.exists() {
            (HeraldConfig::default(), ConfigSource::Missing(path))
        } else {
            match HeraldConfig::load(&path) {
                Ok(config) => (config, ConfigSource::File(path)),
                Err(e) => (HeraldConfig::default(), ConfigSource::Invalid(path, e)),
            }
        };
        self.apply(&mut config);
        (config, source)
    }

    /// Fold the command-line overrides into a loaded config.
    pub fn apply(&self, config: &mut HeraldConfig) {
        config.api.port = self.resolve_port(config.api.port);
        if let Some(ref dir) = self.actions_dir {
            config.actions.root = dir.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}
