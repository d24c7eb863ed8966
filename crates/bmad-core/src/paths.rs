use crate::error::{BmadError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const BMAD_DIR: &str = ".bmad";
pub const CHECKPOINTS_DIR: &str = ".bmad/checkpoints";
pub const CONFIG_FILE: &str = ".bmad/config.yaml";

pub const BMAD_OUTPUT_DIR: &str = "_bmad-output";
pub const SPRINT_STATUS_FILE: &str = "_bmad-output/implementation-artifacts/sprint-status.yaml";

pub const CHECKPOINT_EXT: &str = "yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn sprint_status_path(root: &Path) -> PathBuf {
    root.join(SPRINT_STATUS_FILE)
}

pub fn checkpoints_dir(root: &Path) -> PathBuf {
    root.join(CHECKPOINTS_DIR)
}

pub fn checkpoint_path(root: &Path, story_key: &str) -> PathBuf {
    checkpoints_dir(root).join(format!("{story_key}.{CHECKPOINT_EXT}"))
}

// ---------------------------------------------------------------------------
// Story key validation
// ---------------------------------------------------------------------------

static STORY_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn story_key_re() -> &'static Regex {
    STORY_KEY_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*$").unwrap())
}

/// Story keys end up in checkpoint filenames, so they must not contain
/// separators or start with a dot.
pub fn validate_story_key(key: &str) -> Result<()> {
    if key.len() > 128 || !story_key_re().is_match(key) {
        return Err(BmadError::InvalidStoryKey(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
