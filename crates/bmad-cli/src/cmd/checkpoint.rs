use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

use super::Project;
use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum CheckpointSubcommand {
    /// List interrupted runs
    List,
    /// Show the checkpoint recorded for a story
    Show { story: String },
    /// Remove the checkpoint for a story
    Clear { story: String },
}

pub fn run(root: &Path, subcmd: CheckpointSubcommand, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root);
    let store = &project.checkpoints;

    match subcmd {
        CheckpointSubcommand::List => {
            let checkpoints = store.list().context("failed to list checkpoints")?;
            if json {
                return print_json(&checkpoints);
            }
            if checkpoints.is_empty() {
                println!("No interrupted runs.");
                return Ok(());
            }
            let rows = checkpoints
                .iter()
                .map(|c| {
                    vec![
                        c.story_key.clone(),
                        c.failed_workflow.clone(),
                        format!("{}/{}", c.step_index + 1, c.total_steps),
                        c.exit_code.to_string(),
                        c.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ]
                })
                .collect();
            print_table(&["STORY", "FAILED", "STEP", "EXIT", "WHEN"], rows);
        }
        CheckpointSubcommand::Show { story } => {
            let checkpoint = store
                .load(&story)?
                .with_context(|| format!("no checkpoint recorded for story {story}"))?;
            if json {
                return print_json(&checkpoint);
            }
            println!("story:        {}", checkpoint.story_key);
            println!("run:          {}", checkpoint.run_id);
            println!("started at:   {}", checkpoint.start_status);
            println!(
                "failed step:  {}/{} ({}, exit code {})",
                checkpoint.step_index + 1,
                checkpoint.total_steps,
                checkpoint.failed_workflow,
                checkpoint.exit_code
            );
            println!("remaining:    {}", checkpoint.remaining_steps());
            println!("recorded:     {}", checkpoint.created_at.to_rfc3339());
        }
        CheckpointSubcommand::Clear { story } => {
            let existed = store.exists(&story);
            store.clear(&story)?;
            if json {
                return print_json(&serde_json::json!({ "story": story, "cleared": existed }));
            }
            if existed {
                println!("Cleared checkpoint for {story}");
            } else {
                println!("No checkpoint for {story}");
            }
        }
    }
    Ok(())
}
