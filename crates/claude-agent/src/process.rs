use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::types::{Message, PermissionMode, QueryOptions};
use crate::{ClaudeAgentError, Result};

// ─── ClaudeProcess ────────────────────────────────────────────────────────

/// A running `claude --output-format stream-json --input-format stream-json`
/// subprocess.
///
/// The prompt goes in as one JSON user message on stdin, after which stdin is
/// closed; responses are read as JSONL from stdout. Stderr is drained by a
/// background task and attached to the error when the process exits non-zero.
pub(crate) struct ClaudeProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stdin: Option<ChildStdin>,
    stderr_buf: Arc<Mutex<String>>,
}

impl ClaudeProcess {
    /// Spawn the `claude` binary and hand it `prompt`.
    ///
    /// `CLAUDECODE` is removed from the environment so a workflow can be
    /// started from inside another Claude session.
    pub(crate) async fn spawn(prompt: &str, opts: &QueryOptions) -> Result<Self> {
        let mut cmd = build_command(opts);
        cmd.env_remove("CLAUDECODE");
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        let mut process = Self::from_command(cmd)?;

        let user_msg = serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{"type": "text", "text": prompt}]
            }
        });
        process.send_message(&user_msg).await?;
        process.close_stdin();

        Ok(process)
    }

    /// Spawn an arbitrary command in place of `claude`.
    #[cfg(test)]
    pub(crate) fn spawn_command(cmd: Command) -> Result<Self> {
        Self::from_command(cmd)
    }

    fn from_command(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ClaudeAgentError::Process(format!(
                "failed to start {:?}: {e}",
                cmd.as_std().get_program()
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeAgentError::Process("stdout not captured".into()))?;

        let stdin = child.stdin.take();

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            });
        }

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            stdin,
            stderr_buf,
        })
    }

    async fn send_message(&mut self, msg: &serde_json::Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ClaudeAgentError::Process("stdin already closed".into()))?;

        let mut buf = serde_json::to_vec(msg).map_err(|e| {
            ClaudeAgentError::Process(format!("failed to serialize stdin message: {e}"))
        })?;
        buf.push(b'\n');

        stdin.write_all(&buf).await?;
        stdin.flush().await?;
        Ok(())
    }

    fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Read the next JSONL message from stdout.
    ///
    /// Blank lines and valid JSON of an unhandled `type` (hook progress,
    /// rate limit notices, partial chunks) are skipped. Returns `Ok(None)` on
    /// EOF.
    pub(crate) async fn next_message(&mut self) -> Result<Option<Message>> {
        while let Some(line) = self.lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(trimmed) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => {
                    if is_unknown_message_type(trimmed) {
                        tracing::trace!(line = trimmed, "skipping unhandled stream-json message");
                        continue;
                    }
                    return Err(ClaudeAgentError::Parse {
                        line: trimmed.to_owned(),
                        source: e,
                    });
                }
            }
        }
        Ok(None)
    }

    /// Wait for exit; `Some(error)` carrying captured stderr when the process
    /// failed or was killed by a signal.
    pub(crate) async fn wait_exit_error(&mut self) -> Option<ClaudeAgentError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(ClaudeAgentError::Io(e)),
        };

        if status.success() {
            return None;
        }

        let stderr = self
            .stderr_buf
            .lock()
            .ok()
            .map(|b| b.clone())
            .unwrap_or_default();

        let what = match status.code() {
            Some(code) => format!("claude exited with code {code}"),
            None => "claude terminated by signal".to_string(),
        };
        let msg = if stderr.is_empty() {
            what
        } else {
            format!("{what}\nstderr: {stderr}")
        };
        Some(ClaudeAgentError::Process(msg))
    }

    /// Kill the subprocess (best-effort).
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// Valid JSON with a `"type"` field that [`Message`] does not model.
fn is_unknown_message_type(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line)
        .map(|v| {
            v.get("type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| !matches!(t, "system" | "assistant" | "user" | "result"))
        })
        .unwrap_or(false)
}

// ─── Command builder ──────────────────────────────────────────────────────

pub(crate) fn build_command(opts: &QueryOptions) -> Command {
    let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
    let mut cmd = Command::new(exe);

    cmd.arg("--output-format")
        .arg("stream-json")
        .arg("--verbose")
        .arg("--input-format")
        .arg("stream-json");

    if let Some(model) = &opts.model {
        cmd.arg("--model").arg(model);
    }

    if let Some(max_turns) = opts.max_turns {
        cmd.arg("--max-turns").arg(max_turns.to_string());
    }

    if !opts.allowed_tools.is_empty() {
        cmd.arg("--allowed-tools").args(&opts.allowed_tools);
    }

    if opts.permission_mode != PermissionMode::Default {
        cmd.arg("--permission-mode")
            .arg(opts.permission_mode.as_str());
    }

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_command_uses_stream_json_both_ways() {
        let cmd = build_command(&QueryOptions::default());
        assert_eq!(cmd.as_std().get_program(), "claude");
        assert_eq!(
            args(&cmd),
            [
                "--output-format",
                "stream-json",
                "--verbose",
                "--input-format",
                "stream-json"
            ]
        );
    }

    #[test]
    fn options_become_flags() {
        let opts = QueryOptions {
            path_to_executable: Some("/opt/bin/claude".into()),
            model: Some("sonnet".into()),
            max_turns: Some(12),
            permission_mode: PermissionMode::BypassPermissions,
            allowed_tools: vec!["Read".into(), "Bash".into()],
            ..Default::default()
        };
        let cmd = build_command(&opts);
        assert_eq!(cmd.as_std().get_program(), "/opt/bin/claude");
        let a = args(&cmd);
        let joined = a.join(" ");
        assert!(joined.contains("--model sonnet"));
        assert!(joined.contains("--max-turns 12"));
        assert!(joined.contains("--allowed-tools Read Bash"));
        assert!(joined.contains("--permission-mode bypassPermissions"));
    }

    #[test]
    fn unknown_type_detection() {
        assert!(is_unknown_message_type(r#"{"type":"rate_limit_event"}"#));
        assert!(!is_unknown_message_type(r#"{"type":"result"}"#));
        assert!(!is_unknown_message_type(r#"{"no_type":1}"#));
        assert!(!is_unknown_message_type("not json"));
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo 'auth failed' >&2; exit 3");
        let mut process = ClaudeProcess::spawn_command(cmd).unwrap();
        assert!(process.next_message().await.unwrap().is_none());
        // Let the stderr drain task observe EOF.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let err = process.wait_exit_error().await.unwrap().to_string();
        assert!(err.contains("code 3"), "{err}");
        assert!(err.contains("auth failed"), "{err}");
    }

    #[tokio::test]
    async fn clean_exit_is_not_an_error() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 0");
        let mut process = ClaudeProcess::spawn_command(cmd).unwrap();
        assert!(process.next_message().await.unwrap().is_none());
        assert!(process.wait_exit_error().await.is_none());
    }

    #[tokio::test]
    async fn malformed_line_is_a_parse_error() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo '{not json'");
        let mut process = ClaudeProcess::spawn_command(cmd).unwrap();
        let err = process.next_message().await.unwrap_err();
        assert!(matches!(err, ClaudeAgentError::Parse { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_a_process_error() {
        let opts = QueryOptions {
            path_to_executable: Some("/nonexistent/claude-binary".into()),
            ..Default::default()
        };
        let err = ClaudeProcess::spawn("hi", &opts).await.err().unwrap();
        assert!(err.to_string().contains("failed to start"), "{err}");
    }
}
