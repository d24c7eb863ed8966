use bmad_core::executor::Executor;
use std::path::Path;

use super::{claude_runner, plan_stories, print_plans, Project};

// ---------------------------------------------------------------------------
// RunExit — typed non-zero exit codes (no std::process::exit in command code)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RunExit {
    AgentFailed(i32),
}

impl RunExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunExit::AgentFailed(c) => *c,
        }
    }
}

impl std::fmt::Display for RunExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunExit::AgentFailed(code) => write!(f, "claude exited with code {code}"),
        }
    }
}

impl std::error::Error for RunExit {}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(root: &Path, story: &str, dry_run: bool, resume: bool, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root);

    if dry_run {
        let plans = plan_stories(&project, &[story.to_string()])?;
        return print_plans(&plans, json);
    }

    let runner = claude_runner(root)?;
    let cancel = runner.interrupt_token();
    let mut executor = Executor::new(&runner, &project.reader, &project.writer)
        .with_checkpoints(&project.checkpoints);
    executor.set_progress_callback(|step, total, workflow| {
        runner.printer().step_start(step, total, workflow)
    });

    let result = if resume {
        executor.resume(&cancel, story)
    } else {
        executor.execute(&cancel, story)
    };

    match result {
        Ok(()) => {
            println!("Story {story} completed successfully");
            Ok(())
        }
        Err(e) if e.is_story_complete() => {
            println!("Story {story} is already complete, skipping");
            Ok(())
        }
        Err(e) => {
            if project.checkpoints.exists(story) {
                eprintln!("Checkpoint saved; continue with: bmad-automate run {story} --resume");
            }
            Err(anyhow::Error::new(e).context(format!("error running lifecycle for story {story}")))
        }
    }
}
