//! Connection settings: command-line flags layered over an optional YAML file.
//!
//! ```yaml
//! device: /dev/ttyACM0
//! baudrate: 115200
//! repl:
//!   exec_timeout_ms: 20000
//!   banner_timeout_ms: 5000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use pyboard_repl::ReplConfig;
use serde::Deserialize;

use crate::error::{CliError, CliResult};

/// Baud rate used when neither a flag nor the settings file names one.
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Contents of a settings file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub device: Option<String>,
    pub baudrate: Option<u32>,
    pub repl: ReplConfig,
}

impl Settings {
    /// Load settings from a YAML file.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| CliError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Everything needed to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub device: String,
    pub baudrate: u32,
    pub config: ReplConfig,
}

impl Target {
    /// Combine flags with file settings; flags win.
    pub fn resolve(
        device: Option<String>,
        baudrate: Option<u32>,
        exec_timeout_ms: Option<u64>,
        settings: Settings,
    ) -> CliResult<Self> {
        let device = device.or(settings.device).ok_or(CliError::NoDevice)?;
        let baudrate = baudrate.or(settings.baudrate).unwrap_or(DEFAULT_BAUDRATE);
        let mut config = settings.repl;
        if let Some(ms) = exec_timeout_ms {
            config = config.with_exec_timeout(Duration::from_millis(ms));
        }
        Ok(Target {
            device,
            baudrate,
            config,
        })
    }
}
