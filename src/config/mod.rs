//! Configuration module for scopeflow
//!
//! - `EngineConfig` - evaluation engine settings, stored as TOML
//! - [`session`] - saved graphs (nodes, parameters, wiring), stored as JSON
//!
//! # Example
//!
//! ```ignore
//! use scopeflow::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default("engine.toml");
//! if config.gpu_enabled {
//!     // ...
//! }
//! config.save("engine.toml")?;
//! ```

pub mod session;

pub use session::{InputDocument, NodeDocument, ParameterDocument, RestoreReport, SessionDocument};

use crate::error::{Result, ScopeFlowError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the evaluation engine thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Refresh GPU-capable nodes through the compute queue
    #[serde(default)]
    pub gpu_enabled: bool,

    /// Free-running cycle rate; 0 runs cycles only on request
    #[serde(default = "default_cycle_rate")]
    pub cycle_rate_hz: u32,

    /// Refresh every node on every cycle instead of only dirty ones
    #[serde(default)]
    pub force_full_refresh: bool,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Queue family the graph submits GPU work to
    #[serde(default)]
    pub queue_family: u32,
}

fn default_cycle_rate() -> u32 {
    0
}

fn default_log_filter() -> String {
    "info,scopeflow=debug".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gpu_enabled: false,
            cycle_rate_hz: default_cycle_rate(),
            force_full_refresh: false,
            log_filter: default_log_filter(),
            queue_family: 0,
        }
    }
}

impl EngineConfig {
    /// Load engine settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeFlowError::Config(format!("Failed to read engine config {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            ScopeFlowError::Config(format!("Failed to parse engine config {:?}: {}", path, e))
        })
    }

    /// Load engine settings, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save engine settings to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScopeFlowError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScopeFlowError::Config(format!("Failed to serialize engine config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            ScopeFlowError::Config(format!("Failed to write engine config {:?}: {}", path, e))
        })
    }
}
