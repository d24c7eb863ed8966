use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::stream::QueryStream;
use crate::{query_with_cancel, ClaudeAgentError, Message, QueryOptions, Result};

// ─── RunResult ────────────────────────────────────────────────────────────

/// The terminal result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub session_id: String,
    /// The final text Claude produced (empty for error subtypes).
    pub result_text: String,
    pub total_cost_usd: f64,
    pub num_turns: u32,
    pub duration_ms: u64,
    /// `true` if the run ended with any error subtype (max_turns, execution error).
    pub is_error: bool,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Drive `prompt` to completion, handing every message to `handler` as it
/// arrives.
///
/// Returns `Err(Cancelled)` once `cancel` fires (the child is killed), and
/// `Err` when the stream ends without a result message.
pub async fn run_with_handler<F>(
    prompt: impl Into<String>,
    opts: QueryOptions,
    cancel: &CancellationToken,
    handler: F,
) -> Result<RunResult>
where
    F: FnMut(&Message),
{
    collect(query_with_cancel(prompt, opts, cancel.clone()), handler).await
}

/// [`run_with_handler`] without a handler or cancellation.
pub async fn run(prompt: impl Into<String>, opts: QueryOptions) -> Result<RunResult> {
    run_with_handler(prompt, opts, &CancellationToken::new(), |_| {}).await
}

// ─── Internal ─────────────────────────────────────────────────────────────

pub(crate) async fn collect<F>(mut stream: QueryStream, mut handler: F) -> Result<RunResult>
where
    F: FnMut(&Message),
{
    while let Some(msg) = stream.next().await {
        let msg = msg?;
        handler(&msg);
        if let Message::Result(r) = msg {
            return Ok(RunResult {
                session_id: r.session_id.clone(),
                result_text: r.result_text().unwrap_or("").to_string(),
                total_cost_usd: r.total_cost_usd,
                num_turns: r.num_turns,
                duration_ms: r.duration_ms,
                is_error: !r.is_success(),
            });
        }
    }

    Err(ClaudeAgentError::Process(
        "stream ended without a result message".into(),
    ))
}

// ─── Tests ────────────────────────────────────────────────────────────────
