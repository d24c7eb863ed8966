use std::path::Path;

use super::claude_runner;
use super::run::RunExit;

/// Send a one-off prompt to claude, bypassing status routing.
pub fn run(root: &Path, prompt: &str) -> anyhow::Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("prompt must not be empty");
    }
    let runner = claude_runner(root)?;
    let cancel = runner.interrupt_token();
    match runner.run_raw(&cancel, prompt) {
        0 => Ok(()),
        code => Err(RunExit::AgentFailed(code).into()),
    }
}
