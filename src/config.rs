//! Engine configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

const CONFIG_FILE: &str = "gitstore.json";

/// Tunables for the reconciliation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Default ancestry depth per branch for the commit graph
    pub graph_depth: usize,

    /// Number of commits kept in the session's commit log
    pub log_depth: usize,

    /// Context lines around each change in a unified patch
    pub context_lines: usize,

    /// Maximum characters of a commit tag in the graph program
    pub tag_max_length: usize,

    /// Alias given to the highest-priority branch in the graph program
    pub main_alias: String,

    /// Default tracing filter when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph_depth: 50,
            log_depth: 100,
            context_lines: 3,
            tag_max_length: 48,
            main_alias: "main".to_string(),
            log_filter: "gitstore=debug,git2=warn".to_string(),
        }
    }
}

impl EngineConfig {
    /// Default per-user configuration directory
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gitstore"))
    }

    /// Load configuration from disk, falling back to defaults when absent
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save configuration to disk
    pub fn save(&self, config_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(config_dir)?;

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(config_dir.join(CONFIG_FILE), contents)?;
        Ok(())
    }
}
