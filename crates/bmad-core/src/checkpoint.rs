//! Durable record of an interrupted lifecycle run.
//!
//! A checkpoint is written when a workflow step fails and removed once the
//! story's lifecycle completes. It does not drive resumption by itself:
//! resuming re-derives the sequence from the persisted status, which already
//! reflects every step that succeeded. The checkpoint answers "was this run
//! interrupted, and where".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{BmadError, Result};
use crate::paths;
use crate::status::Status;

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: Uuid,
    pub story_key: String,
    /// 0-based index of the step that failed.
    pub step_index: usize,
    pub total_steps: usize,
    /// Status the story held when the run began.
    pub start_status: Status,
    pub failed_workflow: String,
    pub exit_code: i32,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Steps that had not succeeded when the run stopped, the failed one included.
    pub fn remaining_steps(&self) -> usize {
        self.total_steps.saturating_sub(self.step_index)
    }
}

// ---------------------------------------------------------------------------
// CheckpointStore
// ---------------------------------------------------------------------------

/// One YAML file per story under `.bmad/checkpoints/`.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn path(&self, story_key: &str) -> Result<PathBuf> {
        paths::validate_story_key(story_key)?;
        Ok(paths::checkpoint_path(&self.root, story_key))
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path(&checkpoint.story_key)?;
        let data = serde_yaml::to_string(checkpoint)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        tracing::debug!(
            story = %checkpoint.story_key,
            step = checkpoint.step_index,
            path = %path.display(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// `Ok(None)` means no run was interrupted; a record that exists but
    /// cannot be read is [`BmadError::CheckpointCorrupt`].
    pub fn load(&self, story_key: &str) -> Result<Option<Checkpoint>> {
        let path = self.path(story_key)?;
        let data = match std::fs::read_to_string(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(corrupt(&path, e)),
        };
        serde_yaml::from_str(&data)
            .map(Some)
            .map_err(|e| corrupt(&path, e))
    }

    /// Remove the record for `story_key`. Clearing an absent checkpoint succeeds.
    pub fn clear(&self, story_key: &str) -> Result<()> {
        let path = self.path(story_key)?;
        if crate::io::remove_if_exists(&path)? {
            tracing::debug!(story = story_key, "checkpoint cleared");
        }
        Ok(())
    }

    pub fn exists(&self, story_key: &str) -> bool {
        self.path(story_key).is_ok_and(|p| p.is_file())
    }

    /// Every recorded checkpoint, oldest first.
    pub fn list(&self) -> Result<Vec<Checkpoint>> {
        let entries = match std::fs::read_dir(paths::checkpoints_dir(&self.root)) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut checkpoints = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(paths::CHECKPOINT_EXT) {
                continue;
            }
            let data = std::fs::read_to_string(&path).map_err(|e| corrupt(&path, e))?;
            let checkpoint: Checkpoint =
                serde_yaml::from_str(&data).map_err(|e| corrupt(&path, e))?;
            checkpoints.push(checkpoint);
        }
        checkpoints.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(checkpoints)
    }
}

fn corrupt(path: &Path, e: impl std::fmt::Display) -> BmadError {
    BmadError::CheckpointCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
