//! `claude-agent` — async driver for the Claude CLI subprocess.
//!
//! Speaks the `--output-format stream-json --input-format stream-json`
//! protocol: the prompt goes in as a JSON user message on stdin and typed
//! [`Message`]s come back as JSONL on stdout.
//!
//! ```text
//! QueryOptions
//!     │
//!     ▼
//! ClaudeProcess   ← spawns `claude --output-format stream-json …`
//!     │              reads JSONL from stdout, captures stderr
//!     ▼
//! QueryStream     ← futures::Stream<Item = Result<Message>>
//!     │              background task + mpsc channel, cancellable
//!     ▼
//! run_with_handler ← feeds each Message to a callback, returns RunResult
//! ```
//!
//! ```rust,ignore
//! use claude_agent::{run_with_handler, events, QueryOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let result = run_with_handler("say hello", QueryOptions::default(), &cancel, |msg| {
//!     for ev in events(msg) {
//!         println!("{ev:?}");
//!     }
//! })
//! .await?;
//! ```

pub mod error;
pub mod event;
pub mod runner;
pub mod types;

pub(crate) mod process;
pub mod stream;


pub use error::ClaudeAgentError;
pub use event::{events, Event};
pub use runner::{run, run_with_handler, RunResult};
pub use stream::QueryStream;
pub use tokio_util::sync::CancellationToken;
pub use types::{
    AssistantContent, AssistantMessage, ContentBlock, Message, PermissionMode, QueryOptions,
    ResultMessage, SystemMessage, ToolResultContent, UserContentBlock, UserMessage,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeAgentError>;

/// Start a query against the Claude CLI.
///
/// The returned [`QueryStream`] yields messages as they arrive and ends after
/// the first [`Message::Result`] or on process exit.
pub fn query(prompt: impl Into<String>, opts: QueryOptions) -> QueryStream {
    query_with_cancel(prompt, opts, CancellationToken::new())
}

/// [`query`], killing the subprocess when `cancel` fires.
pub fn query_with_cancel(
    prompt: impl Into<String>,
    opts: QueryOptions,
    cancel: CancellationToken,
) -> QueryStream {
    QueryStream::new(prompt.into(), opts, cancel)
}
