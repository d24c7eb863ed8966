use anyhow::Context;
use bmad_core::lifecycle::workflow_for;
use bmad_core::status::Status;
use serde::Serialize;
use std::path::Path;

use super::Project;
use crate::output::{print_json, print_table};

#[derive(Debug, Serialize)]
struct StoryStatus {
    story: String,
    status: String,
    /// Next workflow; `None` when done or the status is not a story status.
    next: Option<&'static str>,
}

fn next_workflow(raw: &str) -> Option<&'static str> {
    raw.parse::<Status>().ok().and_then(|s| workflow_for(s).ok())
}

pub fn run(root: &Path, story: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root);

    if let Some(story) = story {
        let status = project
            .reader
            .story_status(story)
            .with_context(|| format!("cannot read status of story {story}"))?;
        let row = StoryStatus {
            story: story.to_string(),
            status: status.to_string(),
            next: workflow_for(status).ok(),
        };
        if json {
            return print_json(&row);
        }
        match row.next {
            Some(next) => println!("{story}: {status} (next: {next})"),
            None => println!("{story}: {status}"),
        }
        if project.checkpoints.exists(story) {
            println!("interrupted run recorded; resume with: bmad-automate run {story} --resume");
        }
        return Ok(());
    }

    let sprint = project
        .reader
        .read()
        .context("cannot read sprint status")?;
    let rows: Vec<StoryStatus> = sprint
        .entries()
        .map(|(key, raw)| StoryStatus {
            story: key.to_string(),
            status: raw.to_string(),
            next: next_workflow(raw),
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No stories in {}", project.reader.path().display());
        return Ok(());
    }
    let table = rows
        .into_iter()
        .map(|r| {
            vec![
                r.story,
                r.status,
                r.next.unwrap_or("-").to_string(),
            ]
        })
        .collect();
    print_table(&["STORY", "STATUS", "NEXT"], table);
    Ok(())
}
