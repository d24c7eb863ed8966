use anyhow::Context;
use bmad_core::config::Config;
use bmad_core::executor::WorkflowRunner;
use claude_agent::{events, ClaudeAgentError, PermissionMode, QueryOptions};
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::output::Printer;

/// Exit code reported for a run stopped by Ctrl-C.
pub const EXIT_CANCELLED: i32 = 130;

/// Runs workflows by handing their rendered prompt to the `claude` CLI and
/// streaming its events to the terminal.
///
/// Owns the tokio runtime the async driver runs on; every call blocks until
/// the subprocess finishes.
pub struct ClaudeWorkflowRunner {
    config: Config,
    opts: QueryOptions,
    printer: Printer,
    rt: tokio::runtime::Runtime,
}

impl ClaudeWorkflowRunner {
    pub fn new(root: &Path, config: Config) -> anyhow::Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            anyhow::bail!("invalid config: {}", problems.join("; "));
        }

        let binary = which::which(&config.claude.binary_path).with_context(|| {
            format!(
                "claude binary '{}' not found (set claude.binary_path or BMAD_CLAUDE_PATH)",
                config.claude.binary_path
            )
        })?;
        tracing::debug!(binary = %binary.display(), "resolved claude binary");

        let permission_mode = match &config.claude.permission_mode {
            Some(mode) => mode
                .parse::<PermissionMode>()
                .context("invalid claude.permission_mode")?,
            None => PermissionMode::Default,
        };

        let opts = QueryOptions {
            path_to_executable: Some(binary.to_string_lossy().into_owned()),
            model: config.claude.model.clone(),
            max_turns: config.claude.max_turns,
            permission_mode,
            allowed_tools: config.claude.allowed_tools.clone(),
            cwd: Some(root.to_path_buf()),
            ..Default::default()
        };

        let printer = Printer::stdout(config.output.truncate_lines, config.output.truncate_length);
        let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;

        Ok(Self {
            config,
            opts,
            printer,
            rt,
        })
    }

    pub fn printer(&self) -> &Printer {
        &self.printer
    }

    /// A token cancelled on the first Ctrl-C.
    pub fn interrupt_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let trigger = token.clone();
        self.rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping current workflow");
                trigger.cancel();
            }
        });
        token
    }

    /// Send `prompt` to claude as-is, without a workflow template.
    pub fn run_raw(&self, cancel: &CancellationToken, prompt: &str) -> i32 {
        self.run_prompt(cancel, "raw", prompt)
    }

    fn run_prompt(&self, cancel: &CancellationToken, label: &str, prompt: &str) -> i32 {
        self.printer.command_header(label, prompt);
        let started = Instant::now();

        let result = self.rt.block_on(claude_agent::run_with_handler(
            prompt,
            self.opts.clone(),
            cancel,
            |msg| {
                for event in events(msg) {
                    self.printer.render(&event);
                }
            },
        ));

        let exit_code = match result {
            Ok(r) if !r.is_error => 0,
            Ok(r) => {
                tracing::info!(label, turns = r.num_turns, "claude reported an error result");
                1
            }
            Err(ClaudeAgentError::Cancelled) => EXIT_CANCELLED,
            Err(e) => {
                eprintln!("error: claude run failed: {e}");
                1
            }
        };
        self.printer.command_footer(started.elapsed(), exit_code);
        exit_code
    }
}

impl WorkflowRunner for ClaudeWorkflowRunner {
    fn run_workflow(&self, cancel: &CancellationToken, workflow: &str, story_key: &str) -> i32 {
        let prompt = match self.config.prompt_for(workflow, story_key) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("error: {e}");
                return 1;
            }
        };
        self.run_prompt(cancel, &format!("{workflow}: {story_key}"), &prompt)
    }
}
