use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::process::ClaudeProcess;
use crate::types::{Message, QueryOptions};
use crate::{ClaudeAgentError, Result};

// ─── QueryStream ──────────────────────────────────────────────────────────

/// An async stream of [`Message`]s from a Claude subprocess.
///
/// A background task owns the [`ClaudeProcess`] and forwards messages over
/// an mpsc channel until the terminal `Result` message, process exit, or
/// cancellation. Cancelling kills the child and yields one
/// [`ClaudeAgentError::Cancelled`]. Dropping the stream makes the task exit
/// on its next send.
pub struct QueryStream {
    rx: mpsc::Receiver<Result<Message>>,
}

impl QueryStream {
    pub(crate) fn new(prompt: String, opts: QueryOptions, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let process = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = tx.send(Err(ClaudeAgentError::Cancelled)).await;
                    return;
                }
                spawned = ClaudeProcess::spawn(&prompt, &opts) => spawned,
            };
            match process {
                Ok(p) => pump(p, tx, cancel).await,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        QueryStream { rx }
    }

    /// Stream from an already-running process.
    #[cfg(test)]
    pub(crate) fn from_process(process: ClaudeProcess, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(pump(process, tx, cancel));
        QueryStream { rx }
    }

    /// Wrap a raw receiver, for feeding pre-built message sequences.
    #[cfg(test)]
    pub(crate) fn from_channel(rx: mpsc::Receiver<Result<Message>>) -> Self {
        Self { rx }
    }
}

async fn pump(
    mut process: ClaudeProcess,
    tx: mpsc::Sender<Result<Message>>,
    cancel: CancellationToken,
) {
    let mut got_result = false;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("cancellation requested, killing claude");
                process.kill().await;
                let _ = tx.send(Err(ClaudeAgentError::Cancelled)).await;
                return;
            }
            next = process.next_message() => next,
        };
        match next {
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
            Ok(None) => break,
            Ok(Some(msg)) => {
                let is_terminal = matches!(msg, Message::Result(_));
                got_result |= is_terminal;
                if tx.send(Ok(msg)).await.is_err() || is_terminal {
                    break;
                }
            }
        }
    }

    // Without a result message the exit status is the only explanation.
    if !got_result {
        if let Some(exit_err) = process.wait_exit_error().await {
            let _ = tx.send(Err(exit_err)).await;
        }
    }

    process.kill().await;
}

impl Stream for QueryStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
