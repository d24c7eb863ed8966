use std::path::PathBuf;

use thiserror::Error;

use crate::status::Status;

#[derive(Debug, Error)]
pub enum BmadError {
    #[error("story is complete, no workflow needed")]
    StoryComplete,

    #[error("unknown status value: {0:?}")]
    UnknownStatus(String),

    #[error("failed to read sprint status at {path}: {reason}")]
    StatusFileRead { path: PathBuf, reason: String },

    #[error("invalid story key '{0}': must be alphanumeric with '-', '_' or '.'")]
    InvalidStoryKey(String),

    #[error("story not found: {0}")]
    StoryNotFound(String),

    #[error("no stories found for epic: {0}")]
    NoEpicStories(String),

    #[error("workflow failed: {workflow} returned exit code {exit_code}")]
    WorkflowFailed { workflow: String, exit_code: i32 },

    #[error("failed to persist status '{status}' for story {story}")]
    StatusPersist {
        story: String,
        status: Status,
        #[source]
        source: Box<BmadError>,
    },

    #[error("run cancelled before {workflow} completed")]
    Cancelled { workflow: String },

    #[error("no checkpoint recorded for story {0}")]
    NoCheckpoint(String),

    #[error("checkpoint at {path} is corrupt: {reason}")]
    CheckpointCorrupt { path: PathBuf, reason: String },

    #[error("checkpoint belongs to story {found}, not {requested}")]
    CheckpointMismatch { requested: String, found: String },

    #[error("no prompt configured for workflow: {0}")]
    WorkflowNotConfigured(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BmadError {
    /// True for the "already done" sentinel, which batch callers treat as a skip.
    pub fn is_story_complete(&self) -> bool {
        matches!(self, BmadError::StoryComplete)
    }
}

pub type Result<T> = std::result::Result<T, BmadError>;
