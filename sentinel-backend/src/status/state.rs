//! The one piece of state carried across poll cycles.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which message currently shows the server status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    pub status_message_id: Option<String>,
}

/// JSON file holding the [`DisplayState`] between restarts
pub struct DisplayStateStore {
    path: PathBuf,
}

impl DisplayStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// A missing or unparseable file is an empty state
    pub async fn load(&self) -> Result<DisplayState> {
        if !self.path.exists() {
            tracing::info!("No display state at {:?}, starting fresh", self.path);
            return Ok(DisplayState::default());
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read display state {:?}", self.path))?;
        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(
                    "Display state {:?} is corrupt ({}), starting fresh",
                    self.path,
                    e
                );
                Ok(DisplayState::default())
            }
        }
    }

    pub async fn save(&self, state: &DisplayState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create state directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write display state {:?}", self.path))?;
        Ok(())
    }
}
