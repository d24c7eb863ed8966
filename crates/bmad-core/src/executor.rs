//! Runs a story from its current status to done.
//!
//! The [`Executor`] looks up the story's status, derives the remaining steps
//! with [`lifecycle_for`], and runs each workflow in order, persisting the
//! next status after every successful workflow. The first failure stops the
//! run: a checkpoint is written and the error returned. There are no
//! retries.
//!
//! Collaborators are injected so the state machine can be exercised with
//! fakes: [`WorkflowRunner`] performs a workflow, [`StatusReader`] and
//! [`StatusWriter`] talk to the status store.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{BmadError, Result};
use crate::lifecycle::{lifecycle_for, LifecycleStep, GIT_COMMIT};
use crate::status::Status;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Executes one named workflow for a story.
///
/// Returns the exit code: 0 is success, any other value is failure. The
/// runner is expected to stop early when `cancel` fires.
pub trait WorkflowRunner {
    fn run_workflow(&self, cancel: &CancellationToken, workflow: &str, story_key: &str) -> i32;
}

pub trait StatusReader {
    fn story_status(&self, story_key: &str) -> Result<Status>;
}

pub trait StatusWriter {
    fn update_status(&self, story_key: &str, status: Status) -> Result<()>;
}

/// Called before each step with `(step_index (1-based), total_steps, workflow)`.
pub type ProgressCallback<'a> = Box<dyn Fn(usize, usize, &str) + 'a>;

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor<'a> {
    runner: &'a dyn WorkflowRunner,
    reader: &'a dyn StatusReader,
    writer: &'a dyn StatusWriter,
    checkpoints: Option<&'a CheckpointStore>,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a> Executor<'a> {
    pub fn new(
        runner: &'a dyn WorkflowRunner,
        reader: &'a dyn StatusReader,
        writer: &'a dyn StatusWriter,
    ) -> Self {
        Self {
            runner,
            reader,
            writer,
            checkpoints: None,
            progress: None,
        }
    }

    /// Record failed runs in `store` and clear them on completion.
    pub fn with_checkpoints(mut self, store: &'a CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn set_progress_callback(&mut self, cb: impl Fn(usize, usize, &str) + 'a) {
        self.progress = Some(Box::new(cb));
    }

    /// Run every remaining workflow for `story_key`.
    ///
    /// Returns [`BmadError::StoryComplete`] for stories already done and
    /// [`BmadError::UnknownStatus`] for corrupt status values. A failed
    /// workflow yields [`BmadError::WorkflowFailed`]; a failed status write
    /// yields [`BmadError::StatusPersist`], which leaves the workflow's
    /// effects in place without the status having advanced.
    pub fn execute(&self, cancel: &CancellationToken, story_key: &str) -> Result<()> {
        let start_status = self.reader.story_status(story_key)?;
        let steps = lifecycle_for(start_status)?;
        let total = steps.len();
        let run_id = Uuid::new_v4();

        tracing::info!(
            story = story_key,
            status = %start_status,
            steps = total,
            %run_id,
            "starting lifecycle"
        );

        for (i, step) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(story = story_key, workflow = step.workflow, "cancelled between steps");
                return Err(BmadError::Cancelled {
                    workflow: step.workflow.to_string(),
                });
            }

            if let Some(cb) = &self.progress {
                cb(i + 1, total, step.workflow);
            }

            tracing::info!(story = story_key, workflow = step.workflow, step = i + 1, total, "running workflow");
            let exit_code = self.runner.run_workflow(cancel, step.workflow, story_key);
            if exit_code != 0 {
                self.record_failure(run_id, story_key, i, total, start_status, step.workflow, exit_code);
                return Err(failure(cancel, step.workflow, exit_code));
            }

            self.writer
                .update_status(story_key, step.next_status)
                .map_err(|e| BmadError::StatusPersist {
                    story: story_key.to_string(),
                    status: step.next_status,
                    source: Box::new(e),
                })?;
        }

        if let Some(store) = self.checkpoints {
            store.clear(story_key)?;
        }
        tracing::info!(story = story_key, %run_id, "lifecycle complete");
        Ok(())
    }

    /// The steps [`execute`](Self::execute) would run, without running them.
    pub fn steps(&self, story_key: &str) -> Result<Vec<LifecycleStep>> {
        let status = self.reader.story_status(story_key)?;
        lifecycle_for(status)
    }

    /// Continue an interrupted run.
    ///
    /// The checkpoint must exist and name `story_key`; continuation itself
    /// comes from the persisted status, so this re-enters [`execute`](Self::execute).
    /// A story that already reads done only re-runs `git-commit` when that
    /// was the step that failed; any other checkpoint for it is stale and
    /// is removed.
    pub fn resume(&self, cancel: &CancellationToken, story_key: &str) -> Result<()> {
        let store = self
            .checkpoints
            .ok_or_else(|| BmadError::NoCheckpoint(story_key.to_string()))?;
        let checkpoint = store
            .load(story_key)?
            .ok_or_else(|| BmadError::NoCheckpoint(story_key.to_string()))?;
        if checkpoint.story_key != story_key {
            return Err(BmadError::CheckpointMismatch {
                requested: story_key.to_string(),
                found: checkpoint.story_key,
            });
        }
        tracing::info!(
            story = story_key,
            failed_workflow = %checkpoint.failed_workflow,
            step = checkpoint.step_index + 1,
            total = checkpoint.total_steps,
            "resuming interrupted run"
        );
        match self.execute(cancel, story_key) {
            // git-commit leaves the status at done, so a failed commit is
            // only visible through its checkpoint.
            Err(BmadError::StoryComplete) if checkpoint.failed_workflow == GIT_COMMIT => {
                self.finish_commit(cancel, store, &checkpoint)
            }
            Err(BmadError::StoryComplete) => {
                store.clear(story_key)?;
                Err(BmadError::StoryComplete)
            }
            other => other,
        }
    }

    /// Re-run the final commit for a story whose status already reads done.
    fn finish_commit(
        &self,
        cancel: &CancellationToken,
        store: &CheckpointStore,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        let story_key = checkpoint.story_key.as_str();
        if cancel.is_cancelled() {
            return Err(BmadError::Cancelled {
                workflow: GIT_COMMIT.to_string(),
            });
        }
        if let Some(cb) = &self.progress {
            cb(1, 1, GIT_COMMIT);
        }

        tracing::info!(story = story_key, workflow = GIT_COMMIT, "re-running final commit");
        let exit_code = self.runner.run_workflow(cancel, GIT_COMMIT, story_key);
        if exit_code != 0 {
            self.record_failure(
                checkpoint.run_id,
                story_key,
                checkpoint.step_index,
                checkpoint.total_steps,
                checkpoint.start_status,
                GIT_COMMIT,
                exit_code,
            );
            return Err(failure(cancel, GIT_COMMIT, exit_code));
        }

        store.clear(story_key)?;
        tracing::info!(story = story_key, run_id = %checkpoint.run_id, "lifecycle complete");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn record_failure(
        &self,
        run_id: Uuid,
        story_key: &str,
        step_index: usize,
        total_steps: usize,
        start_status: Status,
        workflow: &str,
        exit_code: i32,
    ) {
        let Some(store) = self.checkpoints else {
            return;
        };
        let checkpoint = Checkpoint {
            run_id,
            story_key: story_key.to_string(),
            step_index,
            total_steps,
            start_status,
            failed_workflow: workflow.to_string(),
            exit_code,
            created_at: Utc::now(),
        };
        // The workflow failure is the error the caller needs to see.
        if let Err(e) = store.save(&checkpoint) {
            tracing::warn!(story = story_key, error = %e, "failed to save checkpoint");
        }
    }
}

/// A non-zero exit is a cancellation when the token fired during the step.
fn failure(cancel: &CancellationToken, workflow: &str, exit_code: i32) -> BmadError {
    if cancel.is_cancelled() {
        BmadError::Cancelled {
            workflow: workflow.to_string(),
        }
    } else {
        BmadError::WorkflowFailed {
            workflow: workflow.to_string(),
            exit_code,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
