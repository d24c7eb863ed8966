pub mod checkpoint;
pub mod epic;
pub mod queue;
pub mod raw;
pub mod run;
pub mod status;

use anyhow::Context;
use bmad_core::checkpoint::CheckpointStore;
use bmad_core::config::Config;
use bmad_core::executor::Executor;
use bmad_core::lifecycle::LifecycleStep;
use bmad_core::sprint::{SprintStatusReader, SprintStatusWriter};
use bmad_core::BmadError;
use serde::Serialize;
use std::path::Path;

use crate::output::{print_json, print_table};
use crate::runner::{ClaudeWorkflowRunner, EXIT_CANCELLED};
use run::RunExit;

/// The stores every lifecycle command works against.
pub struct Project {
    pub reader: SprintStatusReader,
    pub writer: SprintStatusWriter,
    pub checkpoints: CheckpointStore,
}

impl Project {
    pub fn open(root: &Path) -> Self {
        Self {
            reader: SprintStatusReader::new(root),
            writer: SprintStatusWriter::new(root),
            checkpoints: CheckpointStore::new(root),
        }
    }
}

pub fn claude_runner(root: &Path) -> anyhow::Result<ClaudeWorkflowRunner> {
    let config = Config::load(root).context("failed to load config")?;
    ClaudeWorkflowRunner::new(root, config)
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Map an error chain to the process exit code.
///
/// 2 flags data that needs a human (unknown status, corrupt checkpoint),
/// 130 a cancelled run, 1 everything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(exit) = cause.downcast_ref::<RunExit>() {
            return exit.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<BmadError>() {
            return match e {
                BmadError::UnknownStatus(_) | BmadError::CheckpointCorrupt { .. } => 2,
                BmadError::Cancelled { .. } => EXIT_CANCELLED,
                _ => 1,
            };
        }
    }
    1
}

// ---------------------------------------------------------------------------
// Dry-run preview
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StoryPlan {
    pub story: String,
    pub complete: bool,
    pub steps: Vec<LifecycleStep>,
}

/// What a lifecycle run would do for each story, without doing it.
pub fn plan_stories(project: &Project, stories: &[String]) -> anyhow::Result<Vec<StoryPlan>> {
    let runner = NoopRunner;
    let executor = Executor::new(&runner, &project.reader, &project.writer);
    let mut plans = Vec::with_capacity(stories.len());
    for story in stories {
        let plan = match executor.steps(story) {
            Ok(steps) => StoryPlan {
                story: story.clone(),
                complete: false,
                steps,
            },
            Err(e) if e.is_story_complete() => StoryPlan {
                story: story.clone(),
                complete: true,
                steps: Vec::new(),
            },
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("cannot plan story {story}")))
            }
        };
        plans.push(plan);
    }
    Ok(plans)
}

pub fn print_plans(plans: &[StoryPlan], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&plans);
    }
    for plan in plans {
        if plan.complete {
            println!("{}: already complete, nothing to run", plan.story);
            continue;
        }
        println!("{}: {} step(s)", plan.story, plan.steps.len());
        let rows = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                vec![
                    (i + 1).to_string(),
                    s.workflow.to_string(),
                    s.next_status.to_string(),
                ]
            })
            .collect();
        print_table(&["#", "WORKFLOW", "THEN"], rows);
        println!();
    }
    Ok(())
}

/// Stands in for the real runner where only `steps` is called.
struct NoopRunner;

impl bmad_core::executor::WorkflowRunner for NoopRunner {
    fn run_workflow(
        &self,
        _cancel: &tokio_util::sync::CancellationToken,
        _workflow: &str,
        _story_key: &str,
    ) -> i32 {
        1
    }
}

// ---------------------------------------------------------------------------
// Batch execution
// ---------------------------------------------------------------------------

/// Run each story to completion in order. Done stories are skipped; the
/// first failure stops the batch.
pub fn run_batch(root: &Path, stories: &[String]) -> anyhow::Result<()> {
    let project = Project::open(root);
    let runner = claude_runner(root)?;
    let cancel = runner.interrupt_token();
    let mut executor = Executor::new(&runner, &project.reader, &project.writer)
        .with_checkpoints(&project.checkpoints);
    executor.set_progress_callback(|step, total, workflow| {
        runner.printer().step_start(step, total, workflow)
    });

    for story in stories {
        match executor.execute(&cancel, story) {
            Ok(()) => println!("Story {story} completed successfully"),
            Err(e) if e.is_story_complete() => {
                println!("Story {story} is already complete, skipping")
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("error running lifecycle for story {story}")))
            }
        }
    }

    println!("All {} stories processed", stories.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmad_core::status::Status;

    #[test]
    fn exit_codes_follow_error_kind() {
        let unknown = anyhow::Error::new(BmadError::UnknownStatus("blocked".into()))
            .context("error running lifecycle for story 1-1-x");
        assert_eq!(exit_code(&unknown), 2);

        let failed = anyhow::Error::new(BmadError::WorkflowFailed {
            workflow: "dev-story".into(),
            exit_code: 7,
        });
        assert_eq!(exit_code(&failed), 1);

        let cancelled = anyhow::Error::new(BmadError::Cancelled {
            workflow: "dev-story".into(),
        });
        assert_eq!(exit_code(&cancelled), 130);

        let persist = anyhow::Error::new(BmadError::StatusPersist {
            story: "1-1-x".into(),
            status: Status::Review,
            source: Box::new(BmadError::StoryNotFound("1-1-x".into())),
        });
        assert_eq!(exit_code(&persist), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 1);
        assert_eq!(exit_code(&RunExit::AgentFailed(4).into()), 4);
    }
}
