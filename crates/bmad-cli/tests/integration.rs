#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SPRINT: &str = "\
# generated by sprint-planning
project: demo
development_status:
  epic-6: in-progress
  6-1-setup: done
  6-2-api: review   # reviewer assigned
  6-3-ui: backlog
  6-10-polish: ready-for-dev
  epic-6-retrospective: optional
";

/// Stands in for `claude`: logs the stream-json input it receives and
/// answers with a success result, or an error result when the input
/// contains `$FAKE_CLAUDE_FAIL_ON`.
const FAKE_CLAUDE: &str = r#"#!/bin/sh
input=$(cat)
printf '%s\n' "$input" >> "$FAKE_CLAUDE_LOG"
echo '{"type":"system","subtype":"init","session_id":"fake","model":"fake-model"}'
if [ -n "$FAKE_CLAUDE_FAIL_ON" ]; then
  case "$input" in
    *"$FAKE_CLAUDE_FAIL_ON"*)
      echo '{"type":"result","subtype":"error_during_execution","session_id":"fake","is_error":true}'
      exit 0;;
  esac
fi
echo '{"type":"rate_limit_event","session_id":"fake"}'
echo '{"type":"assistant","session_id":"fake","message":{"content":[{"type":"text","text":"working on it"},{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"cargo test","description":"Run tests"}}]}}'
echo '{"type":"user","session_id":"fake","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]},"tool_use_result":{"stdout":"test result: ok","stderr":""}}'
echo '{"type":"result","subtype":"success","session_id":"fake","result":"done","is_error":false,"duration_ms":10}'
"#;

struct Project {
    dir: TempDir,
    claude: PathBuf,
    log: PathBuf,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let sprint = dir
            .path()
            .join("_bmad-output/implementation-artifacts/sprint-status.yaml");
        std::fs::create_dir_all(sprint.parent().unwrap()).unwrap();
        std::fs::write(&sprint, SPRINT).unwrap();

        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let claude = bin_dir.join("claude");
        std::fs::write(&claude, FAKE_CLAUDE).unwrap();
        set_executable(&claude);

        let log = dir.path().join("claude.log");
        Self { dir, claude, log }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("bmad-automate").unwrap();
        cmd.current_dir(self.path())
            .env("BMAD_ROOT", self.path())
            .env("BMAD_CLAUDE_PATH", &self.claude)
            .env("FAKE_CLAUDE_LOG", &self.log)
            .env_remove("BMAD_CONFIG_PATH")
            .env_remove("FAKE_CLAUDE_FAIL_ON")
            .env_remove("RUST_LOG");
        cmd
    }

    fn sprint(&self) -> String {
        std::fs::read_to_string(
            self.path()
                .join("_bmad-output/implementation-artifacts/sprint-status.yaml"),
        )
        .unwrap()
    }

    fn claude_log(&self) -> String {
        std::fs::read_to_string(&self.log).unwrap_or_default()
    }

    fn checkpoint(&self, story: &str) -> PathBuf {
        self.path().join(format!(".bmad/checkpoints/{story}.yaml"))
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) {}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[test]
fn status_lists_sprint_in_file_order() {
    let p = Project::new();
    let out = p.cmd().arg("status").assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let api = stdout.find("6-2-api").unwrap();
    let ui = stdout.find("6-3-ui").unwrap();
    assert!(api < ui);
    assert!(stdout.contains("code-review"));
    assert!(stdout.contains("optional"));
}

#[test]
fn status_single_story_as_json() {
    let p = Project::new();
    p.cmd()
        .args(["--json", "status", "6-10-polish"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "ready-for-dev""#))
        .stdout(predicate::str::contains(r#""next": "dev-story""#));
}

#[test]
fn status_of_missing_story_fails() {
    let p = Project::new();
    p.cmd()
        .args(["status", "9-9-nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("story not found: 9-9-nope"));
}

#[test]
fn missing_sprint_file_fails() {
    let p = Project::new();
    std::fs::remove_file(
        p.path()
            .join("_bmad-output/implementation-artifacts/sprint-status.yaml"),
    )
    .unwrap();
    p.cmd()
        .args(["run", "6-3-ui", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to read sprint status"));
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn dry_run_previews_without_side_effects() {
    let p = Project::new();
    p.cmd()
        .args(["run", "6-3-ui", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6-3-ui: 4 step(s)"))
        .stdout(predicate::str::contains("create-story"))
        .stdout(predicate::str::contains("git-commit"));
    assert_eq!(p.sprint(), SPRINT);
    assert!(p.claude_log().is_empty());
}

#[test]
fn run_backlog_story_to_done() {
    let p = Project::new();
    p.cmd()
        .args(["run", "6-3-ui"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/4] create-story"))
        .stdout(predicate::str::contains("[4/4] git-commit"))
        .stdout(predicate::str::contains("working on it"))
        .stdout(predicate::str::contains("Story 6-3-ui completed successfully"));

    let sprint = p.sprint();
    assert!(sprint.contains("  6-3-ui: done\n"));
    assert!(sprint.contains("# generated by sprint-planning"));
    assert!(sprint.contains("6-2-api: review   # reviewer assigned"));
    assert!(sprint.contains("6-10-polish: ready-for-dev"));

    let log = p.claude_log();
    let order: Vec<usize> = ["create-story", "dev-story", "code-review", "Commit all changes"]
        .iter()
        .map(|w| log.find(w).unwrap_or_else(|| panic!("{w} never ran")))
        .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]), "{order:?}");
    assert!(log.contains("6-3-ui"));
    assert!(!p.checkpoint("6-3-ui").exists());
}

#[test]
fn run_done_story_is_skipped() {
    let p = Project::new();
    p.cmd()
        .args(["run", "6-1-setup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Story 6-1-setup is already complete, skipping"));
    assert!(p.claude_log().is_empty());
}

#[test]
fn failed_workflow_checkpoints_and_resumes() {
    let p = Project::new();
    p.cmd()
        .args(["run", "6-3-ui"])
        .env("FAKE_CLAUDE_FAIL_ON", "workflows:dev-story")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "workflow failed: dev-story returned exit code 1",
        ))
        .stderr(predicate::str::contains("--resume"));

    assert!(p.sprint().contains("  6-3-ui: ready-for-dev\n"));
    assert!(p.checkpoint("6-3-ui").exists());

    p.cmd()
        .args(["checkpoint", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6-3-ui"))
        .stdout(predicate::str::contains("dev-story"))
        .stdout(predicate::str::contains("2/4"));

    p.cmd()
        .args(["run", "6-3-ui", "--resume"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/3] dev-story"));

    assert!(p.sprint().contains("  6-3-ui: done\n"));
    assert!(!p.checkpoint("6-3-ui").exists());
}

#[test]
fn resume_reruns_failed_commit() {
    let p = Project::new();
    p.cmd()
        .args(["run", "6-2-api"])
        .env("FAKE_CLAUDE_FAIL_ON", "Commit all changes")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "workflow failed: git-commit returned exit code 1",
        ));
    assert!(p.sprint().contains("  6-2-api: done"));
    assert!(p.checkpoint("6-2-api").exists());

    p.cmd()
        .args(["run", "6-2-api", "--resume"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/1] git-commit"))
        .stdout(predicate::str::contains("Story 6-2-api completed successfully"));

    let commits = p
        .claude_log()
        .matches("Commit all changes for story 6-2-api")
        .count();
    assert_eq!(commits, 2);
    assert!(!p.checkpoint("6-2-api").exists());
}

#[test]
fn resume_without_checkpoint_fails() {
    let p = Project::new();
    p.cmd()
        .args(["run", "6-2-api", "--resume"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no checkpoint recorded for story 6-2-api"));
    assert!(p.claude_log().is_empty());
}

#[test]
fn unknown_status_exits_2() {
    let p = Project::new();
    let sprint = p
        .path()
        .join("_bmad-output/implementation-artifacts/sprint-status.yaml");
    std::fs::write(&sprint, "development_status:\n  7-1-x: blocked\n").unwrap();
    p.cmd()
        .args(["run", "7-1-x"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown status value"));
    assert!(p.claude_log().is_empty());
}

#[test]
fn missing_claude_binary_fails_before_running() {
    let p = Project::new();
    p.cmd()
        .args(["run", "6-3-ui"])
        .env("BMAD_CLAUDE_PATH", p.path().join("no-such-claude"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
    assert_eq!(p.sprint(), SPRINT);
}

#[test]
fn config_prompt_template_is_used() {
    let p = Project::new();
    std::fs::create_dir_all(p.path().join(".bmad")).unwrap();
    std::fs::write(
        p.path().join(".bmad/config.yaml"),
        "workflows:\n  code-review:\n    prompt: \"CUSTOM REVIEW of {{story_key}}\"\n",
    )
    .unwrap();
    p.cmd().args(["run", "6-2-api"]).assert().success();
    let log = p.claude_log();
    assert!(log.contains("CUSTOM REVIEW of 6-2-api"));
    assert!(p.sprint().contains("6-2-api: done   # reviewer assigned"));
}

// ---------------------------------------------------------------------------
// queue / epic
// ---------------------------------------------------------------------------

#[test]
fn queue_skips_done_and_stops_on_failure() {
    let p = Project::new();
    p.cmd()
        .args(["queue", "6-1-setup", "6-2-api", "6-10-polish", "6-3-ui"])
        .env("FAKE_CLAUDE_FAIL_ON", "6-10-polish")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Story 6-1-setup is already complete, skipping"))
        .stdout(predicate::str::contains("Story 6-2-api completed successfully"))
        .stdout(predicate::str::contains("All").not())
        .stderr(predicate::str::contains("6-10-polish"));

    let sprint = p.sprint();
    assert!(sprint.contains("6-2-api: done"));
    assert!(sprint.contains("6-10-polish: ready-for-dev"));
    assert!(sprint.contains("6-3-ui: backlog"));
    assert!(!p.claude_log().contains("6-3-ui"));
}

#[test]
fn queue_dry_run_as_json() {
    let p = Project::new();
    let out = p
        .cmd()
        .args(["--json", "queue", "6-1-setup", "6-2-api", "--dry-run"])
        .assert()
        .success();
    let plans: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(plans[0]["complete"], true);
    assert_eq!(plans[1]["steps"][0]["workflow"], "code-review");
    assert_eq!(plans[1]["steps"][1]["next_status"], "done");
}

#[test]
fn epic_orders_stories_numerically() {
    let p = Project::new();
    let out = p
        .cmd()
        .args(["--json", "epic", "6", "--dry-run"])
        .assert()
        .success();
    let plans: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    let stories: Vec<&str> = plans
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["story"].as_str().unwrap())
        .collect();
    assert_eq!(stories, ["6-1-setup", "6-2-api", "6-3-ui", "6-10-polish"]);
}

#[test]
fn epic_runs_every_story() {
    let p = Project::new();
    p.cmd()
        .args(["epic", "6"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All 4 stories processed"));
    let sprint = p.sprint();
    for story in ["6-2-api", "6-3-ui", "6-10-polish"] {
        assert!(sprint.contains(&format!("{story}: done")), "{story}");
    }
    assert!(sprint.contains("epic-6: in-progress"));
    assert!(sprint.contains("epic-6-retrospective: optional"));
}

#[test]
fn epic_without_stories_fails() {
    let p = Project::new();
    p.cmd()
        .args(["epic", "9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no stories found for epic: 9"));
}

// ---------------------------------------------------------------------------
// raw / checkpoint
// ---------------------------------------------------------------------------

#[test]
fn raw_sends_prompt_verbatim() {
    let p = Project::new();
    p.cmd()
        .args(["raw", "summarise", "the", "repo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("raw"));
    assert!(p.claude_log().contains("summarise the repo"));
    assert_eq!(p.sprint(), SPRINT);
}

#[test]
fn raw_failure_propagates_exit_code() {
    let p = Project::new();
    p.cmd()
        .args(["raw", "break", "things"])
        .env("FAKE_CLAUDE_FAIL_ON", "break things")
        .assert()
        .code(1);
}

#[test]
fn checkpoint_show_and_clear() {
    let p = Project::new();
    p.cmd()
        .args(["checkpoint", "show", "6-2-api"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no checkpoint recorded"));

    p.cmd()
        .args(["run", "6-2-api"])
        .env("FAKE_CLAUDE_FAIL_ON", "6-2-api")
        .assert()
        .code(1);

    p.cmd()
        .args(["--json", "checkpoint", "show", "6-2-api"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""failed_workflow": "code-review""#))
        .stdout(predicate::str::contains(r#""step_index": 0"#));

    p.cmd()
        .args(["checkpoint", "clear", "6-2-api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared checkpoint for 6-2-api"));
    p.cmd()
        .args(["checkpoint", "clear", "6-2-api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No checkpoint for 6-2-api"));
}

#[test]
fn corrupt_checkpoint_exits_2() {
    let p = Project::new();
    let path = p.checkpoint("6-2-api");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "story_key: [").unwrap();
    p.cmd()
        .args(["run", "6-2-api", "--resume"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("corrupt"));
    assert!(p.claude_log().is_empty());
}
