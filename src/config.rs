use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::platform::Os;

/// Default location looked up when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "devguard.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deadline for each probe, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Treat the host as this OS. Picks the encryption capability, the tools
    /// every host probe runs and the remediation texts; probes whose tools are
    /// missing on the real machine resolve to `Unknown`.
    pub os: Option<Os>,
    /// Override the build's debug flag.
    pub developer_mode: Option<bool>,
    /// Address used for the internet reachability check.
    pub reachability_host: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5000,
            os: None,
            developer_mode: None,
            reachability_host: "1.1.1.1:443".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists.
    /// An explicit path that cannot be read is an error; a missing default file is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            debug!("No {} found, using default settings", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn os(&self) -> Os {
        self.os.unwrap_or_else(Os::current)
    }

    /// Developer mode as seeded at startup: the override, else the build's debug flag.
    pub fn developer_mode(&self) -> bool {
        self.developer_mode.unwrap_or(cfg!(debug_assertions))
    }
}
