//! Visited-URL checkpoint file
//!
//! The file is a JSON object `{"visitedUrls": [...]}`. It is advisory: a
//! missing or unreadable file starts the run empty, and a failed save is
//! logged without stopping the run.

use crate::state::Frontier;
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointFile {
    #[serde(default)]
    visited_urls: Vec<String>,
}

/// Reads and writes the checkpoint for one run
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads previously visited URLs
    ///
    /// # Returns
    ///
    /// The stored URLs, or an empty list when the file is missing or corrupt
    pub fn load(&self) -> Vec<String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No checkpoint at {}, starting fresh", self.path.display());
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Failed to read checkpoint {}, starting fresh: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<CheckpointFile>(&content) {
            Ok(file) => file.visited_urls,
            Err(e) => {
                tracing::warn!("Checkpoint {} is corrupt, starting fresh: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Restores the frontier from the file
    ///
    /// # Returns
    ///
    /// The number of URLs restored
    pub fn restore_into(&self, frontier: &Frontier) -> usize {
        let restored = frontier.restore(self.load());
        if restored > 0 {
            tracing::info!("Restored {} visited URL(s) from {}", restored, self.path.display());
        }
        restored
    }

    /// Saves the frontier if it changed since the last save
    ///
    /// On failure the frontier stays marked as changed so the next save retries.
    ///
    /// # Returns
    ///
    /// * `true` - The file was written
    /// * `false` - Nothing changed or the write failed
    pub fn save_if_dirty(&self, frontier: &Frontier) -> bool {
        if !frontier.take_dirty() {
            return false;
        }

        match self.write(&frontier.snapshot()) {
            Ok(()) => {
                tracing::debug!("Checkpoint saved ({} URLs)", frontier.len());
                true
            }
            Err(e) => {
                tracing::warn!("Failed to save checkpoint {}: {}", self.path.display(), e);
                frontier.mark_dirty();
                false
            }
        }
    }

    /// Writes the file atomically through a temporary sibling
    pub fn write(&self, urls: &[String]) -> Result<(), HarvestError> {
        let file = CheckpointFile {
            visited_urls: urls.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Deletes the file for a fresh run
    pub fn remove(&self) -> Result<(), HarvestError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
