use anyhow::Context;
use std::path::Path;

use super::{plan_stories, print_plans, run_batch, Project};

/// Run every story of `epic_id` (`{epic}-{N}-*`) in story-number order.
pub fn run(root: &Path, epic_id: &str, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let project = Project::open(root);
    let stories = project
        .reader
        .epic_stories(epic_id)
        .with_context(|| format!("cannot list stories for epic {epic_id}"))?;
    tracing::info!(epic = epic_id, stories = stories.len(), "resolved epic stories");

    if dry_run {
        let plans = plan_stories(&project, &stories)?;
        return print_plans(&plans, json);
    }
    run_batch(root, &stories)
}
