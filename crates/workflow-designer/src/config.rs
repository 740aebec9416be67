//! Editor configuration
//!
//! Handles persistent storage of editor defaults (edge styling, undo depth,
//! node placement). Every field has a default, so a partial or missing file
//! still yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::Result;
use crate::types::EdgeStyle;

/// Defaults applied to newly created edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeDefaults {
    /// Edge renderer type (e.g., "smoothstep", "bezier")
    pub edge_type: String,
    pub animated: bool,
    pub style: EdgeStyle,
}

impl Default for EdgeDefaults {
    fn default() -> Self {
        Self {
            edge_type: "smoothstep".to_string(),
            animated: true,
            style: EdgeStyle::default(),
        }
    }
}

/// Configuration for an editor session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum number of undo snapshots
    pub undo_depth: usize,
    /// Offset between consecutive nodes dropped at the viewport centre
    pub node_stagger: f64,
    /// Number of stagger steps before placement wraps around
    pub stagger_cycle: usize,
    /// Styling of new edges
    pub edges: EdgeDefaults,
    /// Colour given to new change-status nodes
    pub default_status_color: String,
    /// Branches given to new decision nodes
    pub default_decision_branches: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_depth: 100,
            node_stagger: 24.0,
            stagger_cycle: 8,
            edges: EdgeDefaults::default(),
            default_status_color: "#3b82f6".to_string(),
            default_decision_branches: vec!["Yes".to_string(), "No".to_string()],
        }
    }
}

impl EditorConfig {
    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await? {
            log::debug!("No editor config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).await?;
        let config = serde_json::from_str(&content)?;
        log::info!("Loaded editor config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a JSON file, creating parent directories
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}
