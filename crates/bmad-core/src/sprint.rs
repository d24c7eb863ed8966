//! `sprint-status.yaml` — the status store for every story in the project.
//!
//! ```yaml
//! # Sprint Status File
//! development_status:
//!   epic-6: in-progress
//!   6-1-define-schema: done
//!   6-2-create-api: review   # inline comments survive updates
//! ```
//!
//! Reads go through `serde_yaml`. Writes edit the single value token in place
//! so comments, ordering and spacing are left untouched.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

use crate::error::{BmadError, Result};
use crate::executor::{StatusReader, StatusWriter};
use crate::paths;
use crate::status::Status;

const DEVELOPMENT_STATUS: &str = "development_status";

// ---------------------------------------------------------------------------
// SprintStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SprintStatus {
    #[serde(default)]
    pub development_status: Mapping,
}

impl SprintStatus {
    /// The raw status string recorded for `key`, if the key exists and holds a scalar.
    pub fn raw_status(&self, key: &str) -> Option<&str> {
        self.development_status.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.development_status.contains_key(key)
    }

    /// All `(key, raw status)` pairs in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.development_status
            .iter()
            .filter_map(|(k, v)| Some((k.as_str()?, v.as_str()?)))
    }

    /// Parsed status for `key`; unknown values are a data-integrity error.
    pub fn status_of(&self, key: &str) -> Result<Status> {
        let raw = self
            .raw_status(key)
            .ok_or_else(|| BmadError::StoryNotFound(key.to_string()))?;
        raw.parse()
    }

    /// Story keys of the form `{epic}-{N}-*`, sorted by `N` numerically.
    pub fn epic_stories(&self, epic_id: &str) -> Vec<String> {
        let pattern = format!(r"^{}-(\d+)-", regex::escape(epic_id));
        let Ok(re) = Regex::new(&pattern) else {
            return Vec::new();
        };
        let mut stories: Vec<(u64, String)> = self
            .entries()
            .filter_map(|(key, _)| {
                let n = re.captures(key)?.get(1)?.as_str().parse().ok()?;
                Some((n, key.to_string()))
            })
            .collect();
        stories.sort();
        stories.into_iter().map(|(_, key)| key).collect()
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads story status from `sprint-status.yaml` under a project root.
#[derive(Debug, Clone)]
pub struct SprintStatusReader {
    path: PathBuf,
}

impl SprintStatusReader {
    pub fn new(root: &Path) -> Self {
        Self {
            path: paths::sprint_status_path(root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<SprintStatus> {
        let data = std::fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        serde_yaml::from_str(&data).map_err(|e| self.read_error(e))
    }

    pub fn story_status(&self, key: &str) -> Result<Status> {
        self.read()?.status_of(key)
    }

    /// Stories belonging to `epic_id`, in story-number order.
    pub fn epic_stories(&self, epic_id: &str) -> Result<Vec<String>> {
        let stories = self.read()?.epic_stories(epic_id);
        if stories.is_empty() {
            return Err(BmadError::NoEpicStories(epic_id.to_string()));
        }
        Ok(stories)
    }

    fn read_error(&self, e: impl std::fmt::Display) -> BmadError {
        BmadError::StatusFileRead {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

impl StatusReader for SprintStatusReader {
    fn story_status(&self, story_key: &str) -> Result<Status> {
        SprintStatusReader::story_status(self, story_key)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Updates a single story's status in `sprint-status.yaml`, atomically.
#[derive(Debug, Clone)]
pub struct SprintStatusWriter {
    reader: SprintStatusReader,
}

impl SprintStatusWriter {
    pub fn new(root: &Path) -> Self {
        Self {
            reader: SprintStatusReader::new(root),
        }
    }

    pub fn update_status(&self, key: &str, status: Status) -> Result<()> {
        let path = self.reader.path();
        let content = std::fs::read_to_string(path).map_err(|e| self.reader.read_error(e))?;
        let parsed: SprintStatus =
            serde_yaml::from_str(&content).map_err(|e| self.reader.read_error(e))?;
        if !parsed.contains(key) {
            return Err(BmadError::StoryNotFound(key.to_string()));
        }

        let updated = match replace_in_place(&content, key, status) {
            Some(updated) => updated,
            None => {
                tracing::debug!(story = key, "falling back to full rewrite of sprint status");
                rewrite_document(&content, key, status)?
            }
        };

        crate::io::atomic_write(path, updated.as_bytes())?;
        tracing::debug!(story = key, status = %status, "sprint status updated");
        Ok(())
    }
}

impl StatusWriter for SprintStatusWriter {
    fn update_status(&self, story_key: &str, status: Status) -> Result<()> {
        SprintStatusWriter::update_status(self, story_key, status)
    }
}

/// Swap the value token on the story's line inside the `development_status`
/// block. Returns `None` when the block is not a plain block mapping or the
/// edit does not round-trip, so the caller can fall back to a full rewrite.
fn replace_in_place(content: &str, key: &str, status: Status) -> Option<String> {
    let mut out = String::with_capacity(content.len() + 16);
    let mut in_block = false;
    let mut child_indent: Option<usize> = None;
    let mut replaced = false;

    for line in content.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let trimmed = body.trim_start();
        let indent = body.len() - trimmed.len();

        if !replaced {
            if indent == 0 && !trimmed.is_empty() && !trimmed.starts_with('#') {
                in_block = trimmed
                    .strip_prefix(DEVELOPMENT_STATUS)
                    .and_then(|rest| rest.trim_start().strip_prefix(':'))
                    .is_some_and(|rest| {
                        let rest = rest.trim();
                        rest.is_empty() || rest.starts_with('#')
                    });
            } else if in_block && indent > 0 && !trimmed.starts_with('#') {
                let expected = *child_indent.get_or_insert(indent);
                if indent == expected {
                    if let Some(value_start) = value_offset(trimmed, key) {
                        let (head, tail) = trimmed.split_at(value_start);
                        let leading = tail.len() - tail.trim_start().len();
                        let token_len = tail[leading..]
                            .find(|c: char| c.is_whitespace())
                            .unwrap_or(tail.len() - leading);
                        let rest = &tail[leading + token_len..];
                        out.push_str(&body[..indent]);
                        out.push_str(head);
                        out.push_str(if leading == 0 { " " } else { &tail[..leading] });
                        out.push_str(status.as_str());
                        out.push_str(rest);
                        out.push_str(&line[body.len()..]);
                        replaced = true;
                        continue;
                    }
                }
            }
        }
        out.push_str(line);
    }

    if !replaced {
        return None;
    }
    let check: SprintStatus = serde_yaml::from_str(&out).ok()?;
    (check.raw_status(key) == Some(status.as_str())).then_some(out)
}

/// Offset of the value part of `line` if the line is the mapping entry for `key`.
fn value_offset(line: &str, key: &str) -> Option<usize> {
    for quote in ["", "\"", "'"] {
        let quoted = format!("{quote}{key}{quote}:");
        if let Some(rest) = line.strip_prefix(quoted.as_str()) {
            if rest.is_empty() || rest.starts_with([' ', '\t']) {
                return Some(quoted.len());
            }
        }
    }
    None
}

fn rewrite_document(content: &str, key: &str, status: Status) -> Result<String> {
    let mut doc: Value = serde_yaml::from_str(content)?;
    let block = doc
        .get_mut(DEVELOPMENT_STATUS)
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| BmadError::StoryNotFound(key.to_string()))?;
    block.insert(Value::from(key), Value::from(status.as_str()));
    Ok(serde_yaml::to_string(&doc)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
