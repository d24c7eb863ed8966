use crate::error::{BmadError, Result};
use crate::lifecycle::{self, CODE_REVIEW, CREATE_STORY, DEV_STORY, GIT_COMMIT};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Explicit config file, overriding `.bmad/config.yaml`.
pub const CONFIG_PATH_ENV: &str = "BMAD_CONFIG_PATH";
/// Explicit `claude` binary, overriding `claude.binary_path`.
pub const CLAUDE_PATH_ENV: &str = "BMAD_CLAUDE_PATH";

/// Placeholder substituted with the story key in workflow prompts.
pub const STORY_KEY_PLACEHOLDER: &str = "{{story_key}}";

// ---------------------------------------------------------------------------
// WorkflowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub prompt: String,
}

fn default_workflows() -> BTreeMap<String, WorkflowConfig> {
    let prompts = [
        (
            CREATE_STORY,
            "/bmad:bmm:workflows:create-story - Create story: {{story_key}}. \
             Do not ask questions; make reasonable decisions and proceed.",
        ),
        (
            DEV_STORY,
            "/bmad:bmm:workflows:dev-story - Work on story: {{story_key}}. \
             Complete all tasks and run the tests. Do not ask for confirmation.",
        ),
        (
            CODE_REVIEW,
            "/bmad:bmm:workflows:code-review - Review story: {{story_key}}. \
             Fix every issue you find automatically.",
        ),
        (
            GIT_COMMIT,
            "Commit all changes for story {{story_key}} with a descriptive message, \
             then push to the current branch.",
        ),
    ];
    prompts
        .into_iter()
        .map(|(name, prompt)| {
            (
                name.to_string(),
                WorkflowConfig {
                    prompt: prompt.to_string(),
                },
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ClaudeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeConfig {
    /// Path or name of the `claude` executable; resolved on `PATH` when bare.
    #[serde(default = "default_binary_path")]
    pub binary_path: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default = "default_permission_mode")]
    pub permission_mode: Option<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

fn default_binary_path() -> String {
    "claude".to_string()
}

fn default_permission_mode() -> Option<String> {
    Some("bypassPermissions".to_string())
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            model: None,
            max_turns: None,
            permission_mode: default_permission_mode(),
            allowed_tools: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Lines of tool output shown before truncating.
    #[serde(default = "default_truncate_lines")]
    pub truncate_lines: usize,
    /// Characters of a prompt shown in command headers.
    #[serde(default = "default_truncate_length")]
    pub truncate_length: usize,
}

fn default_truncate_lines() -> usize {
    20
}

fn default_truncate_length() -> usize {
    60
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            truncate_lines: default_truncate_lines(),
            truncate_length: default_truncate_length(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_workflows")]
    pub workflows: BTreeMap<String, WorkflowConfig>,
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflows: default_workflows(),
            claude: ClaudeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load `.bmad/config.yaml` under `root`, or the file named by
    /// `BMAD_CONFIG_PATH`. A missing default file yields the defaults; a
    /// missing explicit file is an error. `BMAD_CLAUDE_PATH` overrides the
    /// binary path in either case.
    pub fn load(root: &Path) -> Result<Self> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| paths::config_path(root));

        let mut config = match std::fs::read_to_string(&path) {
            Ok(data) => Self::from_yaml(&data)
                .map_err(|e| BmadError::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(BmadError::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        if let Some(binary) = std::env::var(CLAUDE_PATH_ENV).ok().filter(|s| !s.is_empty()) {
            config.claude.binary_path = binary;
        }
        Ok(config)
    }

    /// Parse a config document. Workflows named in the document replace the
    /// defaults of the same name; the others keep their default prompt.
    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Config = serde_yaml::from_str(data)?;
        for (name, workflow) in default_workflows() {
            config.workflows.entry(name).or_insert(workflow);
        }
        Ok(config)
    }

    /// Render the prompt for `workflow` with the story key substituted.
    pub fn prompt_for(&self, workflow: &str, story_key: &str) -> Result<String> {
        let wf = self
            .workflows
            .get(workflow)
            .ok_or_else(|| BmadError::WorkflowNotConfigured(workflow.to_string()))?;
        Ok(wf.prompt.replace(STORY_KEY_PLACEHOLDER, story_key))
    }

    /// Report problems that would stop a lifecycle run part-way.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for name in lifecycle::WORKFLOWS {
            match self.workflows.get(name) {
                None => problems.push(format!("workflow '{name}' has no prompt")),
                Some(wf) if wf.prompt.trim().is_empty() => {
                    problems.push(format!("workflow '{name}' has an empty prompt"))
                }
                Some(_) => {}
            }
        }
        if self.claude.binary_path.trim().is_empty() {
            problems.push("claude.binary_path is empty".to_string());
        }
        if self.claude.max_turns == Some(0) {
            problems.push("claude.max_turns must be at least 1".to_string());
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_cover_every_lifecycle_workflow() {
        let config = Config::default();
        assert!(config.validate().is_empty());
        for name in lifecycle::WORKFLOWS {
            let prompt = config.prompt_for(name, "6-1-story").unwrap();
            assert!(prompt.contains("6-1-story"), "{name}: {prompt}");
            assert!(!prompt.contains(STORY_KEY_PLACEHOLDER));
        }
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config = Config::from_yaml(
            "workflows:\n  dev-story:\n    prompt: \"implement {{story_key}}\"\noutput:\n  truncate_lines: 5\n",
        )
        .unwrap();
        assert_eq!(
            config.prompt_for(DEV_STORY, "1-2-x").unwrap(),
            "implement 1-2-x"
        );
        assert!(config.prompt_for(CREATE_STORY, "1-2-x").is_ok());
        assert_eq!(config.output.truncate_lines, 5);
        assert_eq!(config.output.truncate_length, 60);
        assert_eq!(config.claude, ClaudeConfig::default());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn unknown_workflow_is_not_configured() {
        let err = Config::default().prompt_for("deploy", "1-1-x").unwrap_err();
        assert!(matches!(err, BmadError::WorkflowNotConfigured(ref w) if w == "deploy"));
    }

    #[test]
    fn validate_flags_empty_prompt_and_zero_turns() {
        let mut config = Config::default();
        config.workflows.insert(
            GIT_COMMIT.to_string(),
            WorkflowConfig {
                prompt: "  ".to_string(),
            },
        );
        config.claude.max_turns = Some(0);
        let problems = config.validate();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("git-commit"));
    }

    #[test]
    fn claude_section_parses() {
        let config = Config::from_yaml(
            "claude:\n  binary_path: /opt/claude\n  model: sonnet\n  max_turns: 40\n  allowed_tools: [Read, Edit]\n",
        )
        .unwrap();
        assert_eq!(config.claude.binary_path, "/opt/claude");
        assert_eq!(config.claude.model.as_deref(), Some("sonnet"));
        assert_eq!(config.claude.max_turns, Some(40));
        assert_eq!(config.claude.allowed_tools, ["Read", "Edit"]);
        assert_eq!(
            config.claude.permission_mode.as_deref(),
            Some("bypassPermissions")
        );
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(Config::from_yaml("workflows: [").is_err());
    }

    #[test]
    fn load_reads_project_config() {
        let dir = TempDir::new().unwrap();
        let path = paths::config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "output:\n  truncate_length: 10\n").unwrap();
        // Env overrides are exercised by the CLI integration tests, which run
        // in their own process.
        if std::env::var_os(CONFIG_PATH_ENV).is_none() {
            assert_eq!(Config::load(dir.path()).unwrap().output.truncate_length, 10);
        }
    }

    #[test]
    fn load_reports_malformed_project_config() {
        let dir = TempDir::new().unwrap();
        let path = paths::config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "claude: [").unwrap();
        if std::env::var_os(CONFIG_PATH_ENV).is_none() {
            assert!(matches!(
                Config::load(dir.path()).unwrap_err(),
                BmadError::Config(_)
            ));
        }
    }
}
