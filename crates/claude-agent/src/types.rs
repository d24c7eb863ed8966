use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ─── Outer Message enum ───────────────────────────────────────────────────

/// The messages of `claude --output-format stream-json` that a workflow run
/// consumes. Discriminated by the JSON `"type"` field; any other type is
/// skipped by the reader before it reaches this enum.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    Assistant(AssistantMessage),
    User(UserMessage),
    Result(ResultMessage),
}

impl Message {
    pub fn session_id(&self) -> &str {
        match self {
            Message::System(m) => &m.session_id,
            Message::Assistant(m) => &m.session_id,
            Message::User(m) => &m.session_id,
            Message::Result(m) => &m.session_id,
        }
    }

    /// Returns `Some(&ResultMessage)` if this is the terminal result message.
    pub fn as_result(&self) -> Option<&ResultMessage> {
        if let Message::Result(r) = self {
            Some(r)
        } else {
            None
        }
    }
}

// ─── System messages ──────────────────────────────────────────────────────

/// `type = "system"`. Only `subtype = "init"` carries the fields below; other
/// subtypes leave them empty.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemMessage {
    pub subtype: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl SystemMessage {
    pub fn is_init(&self) -> bool {
        self.subtype == "init"
    }
}

// ─── Assistant messages ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantMessage {
    pub message: AssistantContent,
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantContent {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// Tool inputs vary per tool.
        #[serde(default)]
        input: serde_json::Value,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Unknown,
}

// ─── User messages ────────────────────────────────────────────────────────

/// `type = "user"` — tool results fed back to the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserMessage {
    pub message: UserContent,
    #[serde(default)]
    pub session_id: String,
    /// Structured tool output. An object with `stdout`/`stderr` for shell
    /// tools, a bare string or other shapes for the rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_result: Option<serde_json::Value>,
}

impl UserMessage {
    pub fn tool_stdout(&self) -> Option<&str> {
        self.tool_use_result
            .as_ref()
            .and_then(|v| v.get("stdout"))
            .and_then(|v| v.as_str())
    }

    pub fn tool_stderr(&self) -> Option<&str> {
        self.tool_use_result
            .as_ref()
            .and_then(|v| v.get("stderr"))
            .and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserContent {
    #[serde(default)]
    pub content: Vec<UserContentBlock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserContentBlock {
    Text {
        text: String,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<ToolResultContent>,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

/// Tool result content arrives either as a plain string or as text blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ToolResultBlock>),
}

impl ToolResultContent {
    pub fn text(&self) -> String {
        match self {
            ToolResultContent::Text(s) => s.clone(),
            ToolResultContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| b.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolResultBlock {
    #[serde(default)]
    pub text: Option<String>,
}

// ─── Result messages ──────────────────────────────────────────────────────

/// `type = "result"` — the terminal message of every run.
///
/// `subtype` is `success` or one of the `error_*` variants; anything but
/// `success` with `is_error == false` counts as failure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultMessage {
    pub subtype: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ResultMessage {
    pub fn is_success(&self) -> bool {
        self.subtype == "success" && !self.is_error
    }

    /// The final result text. `None` for error subtypes.
    pub fn result_text(&self) -> Option<&str> {
        if self.subtype == "success" {
            self.result.as_deref()
        } else {
            None
        }
    }
}

// ─── QueryOptions ─────────────────────────────────────────────────────────

/// Options for driving a Claude subprocess query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Custom path to the `claude` binary (default: `"claude"`)
    pub path_to_executable: Option<String>,
    pub model: Option<String>,
    /// Maximum number of agentic turns before stopping with `error_max_turns`
    pub max_turns: Option<u32>,
    pub permission_mode: PermissionMode,
    /// Tool names that are auto-approved without prompting
    pub allowed_tools: Vec<String>,
    /// Working directory for the subprocess (default: current dir)
    pub cwd: Option<std::path::PathBuf>,
    pub env: HashMap<String, String>,
}

/// Controls how tool executions are authorized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
    DontAsk,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
            PermissionMode::DontAsk => "dontAsk",
        }
    }
}

impl FromStr for PermissionMode {
    type Err = crate::ClaudeAgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(PermissionMode::Default),
            "acceptEdits" => Ok(PermissionMode::AcceptEdits),
            "bypassPermissions" => Ok(PermissionMode::BypassPermissions),
            "plan" => Ok(PermissionMode::Plan),
            "dontAsk" => Ok(PermissionMode::DontAsk),
            other => Err(crate::ClaudeAgentError::InvalidOption(format!(
                "unknown permission mode: {other}"
            ))),
        }
    }
}
