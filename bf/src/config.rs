//! budgetflow configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::view::Locale;

/// Main budgetflow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level when not given on the command line
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Budget orchestration behavior
    pub orchestrator: OrchestratorConfig,

    /// Presentation settings
    pub view: ViewConfig,

    /// IPC plumbing
    pub ipc: IpcConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .budgetflow.yml
        let local_config = PathBuf::from(".budgetflow.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/budgetflow/budgetflow.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("budgetflow").join("budgetflow.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from the config chain, read before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Budget orchestration behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Identity stamped as salesman on created budgets
    pub creator: String,

    /// Undo stock adjustments when the budget exchange that follows fails
    #[serde(rename = "compensate-stock")]
    pub compensate_stock: bool,

    /// Seconds to wait for a completion event (unset waits forever)
    #[serde(rename = "wait-timeout-secs", skip_serializing_if = "Option::is_none")]
    pub wait_timeout_secs: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            creator: "admin".to_string(),
            compensate_stock: true,
            wait_timeout_secs: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }
}

/// Presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Locale applied when budgets are loaded
    pub locale: Locale,

    #[serde(rename = "currency-symbol")]
    pub currency_symbol: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            locale: Locale::PtBr,
            currency_symbol: "R$".to_string(),
        }
    }
}

/// IPC plumbing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Request queue size of the event waiter actor
    #[serde(rename = "channel-buffer")]
    pub channel_buffer: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self { channel_buffer: 256 }
    }
}
