//! Status-based workflow routing.
//!
//! The lifecycle is a fixed table: every start status maps to the exact
//! remaining sequence of workflows needed to reach `done`. The final
//! `git-commit` step maps to `done`, the same status the `code-review` step
//! before it already wrote.

use serde::Serialize;

use crate::error::{BmadError, Result};
use crate::status::Status;

pub const CREATE_STORY: &str = "create-story";
pub const DEV_STORY: &str = "dev-story";
pub const CODE_REVIEW: &str = "code-review";
pub const GIT_COMMIT: &str = "git-commit";

/// Every workflow the lifecycle can schedule, in lifecycle order.
pub const WORKFLOWS: [&str; 4] = [CREATE_STORY, DEV_STORY, CODE_REVIEW, GIT_COMMIT];

/// One step of a story lifecycle: the workflow to run and the status the
/// story moves to once that workflow succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleStep {
    pub workflow: &'static str,
    pub next_status: Status,
}

const fn step(workflow: &'static str, next_status: Status) -> LifecycleStep {
    LifecycleStep {
        workflow,
        next_status,
    }
}

/// Return the remaining steps that take a story from `status` to done.
///
/// `Done` yields [`BmadError::StoryComplete`], which callers iterating over
/// many stories treat as a skip rather than a failure.
pub fn lifecycle_for(status: Status) -> Result<Vec<LifecycleStep>> {
    match status {
        Status::Backlog => Ok(vec![
            step(CREATE_STORY, Status::ReadyForDev),
            step(DEV_STORY, Status::Review),
            step(CODE_REVIEW, Status::Done),
            step(GIT_COMMIT, Status::Done),
        ]),
        Status::ReadyForDev | Status::InProgress => Ok(vec![
            step(DEV_STORY, Status::Review),
            step(CODE_REVIEW, Status::Done),
            step(GIT_COMMIT, Status::Done),
        ]),
        Status::Review => Ok(vec![
            step(CODE_REVIEW, Status::Done),
            step(GIT_COMMIT, Status::Done),
        ]),
        Status::Done => Err(BmadError::StoryComplete),
    }
}

/// Same as [`lifecycle_for`], for a status string read straight from disk.
///
/// Values outside the enumerated set yield [`BmadError::UnknownStatus`].
pub fn lifecycle_for_raw(raw: &str) -> Result<Vec<LifecycleStep>> {
    lifecycle_for(raw.parse()?)
}

/// The single workflow a story in `status` needs next.
pub fn workflow_for(status: Status) -> Result<&'static str> {
    let steps = lifecycle_for(status)?;
    // Every non-done status has at least one step.
    Ok(steps[0].workflow)
}
