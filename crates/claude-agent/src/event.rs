//! Flattened, display-oriented view of stream-json messages.
//!
//! One [`Message`] can carry several content blocks; [`events`] splits it into
//! the individual things a terminal printer shows.

use crate::types::{ContentBlock, Message, UserContentBlock};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionStarted {
        model: Option<String>,
    },
    Text(String),
    ToolUse {
        name: String,
        /// `description` input, when the tool has one (Bash, Task).
        description: Option<String>,
        command: Option<String>,
        file_path: Option<String>,
    },
    ToolResult {
        stdout: String,
        stderr: String,
        is_error: bool,
    },
    SessionComplete {
        success: bool,
        duration_ms: u64,
        total_cost_usd: f64,
    },
}

pub fn events(msg: &Message) -> Vec<Event> {
    match msg {
        Message::System(sys) if sys.is_init() => vec![Event::SessionStarted {
            model: sys.model.clone(),
        }],
        Message::System(_) => Vec::new(),
        Message::Assistant(a) => a
            .message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } if !text.trim().is_empty() => {
                    Some(Event::Text(text.clone()))
                }
                ContentBlock::ToolUse { name, input, .. } => Some(Event::ToolUse {
                    name: name.clone(),
                    description: input_str(input, "description"),
                    command: input_str(input, "command"),
                    file_path: input_str(input, "file_path"),
                }),
                _ => None,
            })
            .collect(),
        Message::User(u) => {
            let is_error = u.message.content.iter().any(|b| {
                matches!(
                    b,
                    UserContentBlock::ToolResult {
                        is_error: Some(true),
                        ..
                    }
                )
            });
            if u.tool_stdout().is_some() || u.tool_stderr().is_some() {
                return vec![Event::ToolResult {
                    stdout: u.tool_stdout().unwrap_or_default().to_string(),
                    stderr: u.tool_stderr().unwrap_or_default().to_string(),
                    is_error,
                }];
            }
            u.message
                .content
                .iter()
                .filter_map(|block| match block {
                    UserContentBlock::ToolResult {
                        content, is_error, ..
                    } => {
                        let text = content.as_ref().map(|c| c.text()).unwrap_or_default();
                        let is_error = is_error.unwrap_or(false);
                        Some(if is_error {
                            Event::ToolResult {
                                stdout: String::new(),
                                stderr: text,
                                is_error,
                            }
                        } else {
                            Event::ToolResult {
                                stdout: text,
                                stderr: String::new(),
                                is_error,
                            }
                        })
                    }
                    _ => None,
                })
                .collect()
        }
        Message::Result(r) => vec![Event::SessionComplete {
            success: r.is_success(),
            duration_ms: r.duration_ms,
            total_cost_usd: r.total_cost_usd,
        }],
    }
}

fn input_str(input: &serde_json::Value, key: &str) -> Option<String> {
    input.get(key).and_then(|v| v.as_str()).map(str::to_string)
}
