use std::path::Path;

use super::{plan_stories, print_plans, run_batch, Project};

pub fn run(root: &Path, stories: &[String], dry_run: bool, json: bool) -> anyhow::Result<()> {
    if dry_run {
        let plans = plan_stories(&Project::open(root), stories)?;
        return print_plans(&plans, json);
    }
    run_batch(root, stories)
}
