//! Checkpoint store implementation
//!
//! Provides file-based checkpoint persistence with atomic writes.

use super::types::{Checkpoint, CHECKPOINT_VERSION};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Loads and saves the checkpoint of one job
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    /// Path to the checkpoint file (`None` = in-memory)
    path: Option<PathBuf>,
}

impl CheckpointStore {
    /// Create a store backed by the given file
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Create an in-memory store (loads empty, saves nothing)
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    /// Get the checkpoint file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }

    /// Load the checkpoint, or an empty one if the file does not exist.
    ///
    /// A file that exists but cannot be parsed is never treated as empty.
    pub async fn load(&self) -> Result<Checkpoint> {
        let Some(path) = &self.path else {
            return Ok(Checkpoint::new());
        };

        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}, starting fresh", path.display());
                return Ok(Checkpoint::new());
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "Failed to read checkpoint {}: {e}",
                    path.display()
                )))
            }
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&contents)
            .map_err(|e| Error::corrupt_checkpoint(path, e.to_string()))?;

        if checkpoint.version > CHECKPOINT_VERSION {
            return Err(Error::corrupt_checkpoint(
                path,
                format!(
                    "unsupported version {} (this build reads up to {CHECKPOINT_VERSION})",
                    checkpoint.version
                ),
            ));
        }

        debug!(
            "Loaded checkpoint {} with {} entries",
            path.display(),
            checkpoint.len()
        );
        Ok(checkpoint)
    }

    /// Persist the full checkpoint atomically.
    ///
    /// Writes a sibling temp file, syncs it, then renames it over the target.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(()); // In-memory mode
        };

        let contents = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| Error::persistence(format!("Failed to serialize checkpoint: {e}")))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    Error::persistence(format!(
                        "Failed to create checkpoint directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let temp_path = temp_path(path);
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::persistence(format!("Failed to create temp checkpoint: {e}")))?;
        file.write_all(&contents)
            .await
            .map_err(|e| Error::persistence(format!("Failed to write checkpoint: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| Error::persistence(format!("Failed to sync checkpoint: {e}")))?;
        drop(file);

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::persistence(format!("Failed to rename checkpoint: {e}")))?;

        debug!(
            "Saved checkpoint {} ({} entries)",
            path.display(),
            checkpoint.len()
        );
        Ok(())
    }
}

/// Temp file next to the target, so the rename stays on one filesystem
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "checkpoint".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!("{name}.tmp"))
}

#[cfg(test)]
pub(super) fn temp_path_for(path: &Path) -> PathBuf {
    temp_path(path)
}
