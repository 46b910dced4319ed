//! Shared test infrastructure for integration tests.
//!
//! Runs the built `gatekeeper` binary with a shell-script evaluator that
//! copies the workspace out before the run tears it down.

use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tempfile::TempDir;

const FAKE_EVALUATOR: &str = r#"
printf '%s' "$1" > "$GATEKEEPER_TEST_WORKSPACE_FILE"
cp "$1"/*.json "$GATEKEEPER_TEST_ARTIFACTS" 2>/dev/null || true
shift
printf 'evaluated with args:%s\n' "$*"
echo "evaluator diagnostics" >&2
sleep "${GATEKEEPER_TEST_SLEEP:-0}"
exit "${GATEKEEPER_TEST_STATUS:-0}"
"#;

/// Result of one `gatekeeper` invocation.
#[derive(Debug)]
pub struct RunResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Artifacts the evaluator saw, parsed as JSON.
    pub artifacts: BTreeMap<String, Value>,
    /// Workspace path handed to the evaluator, if it ran.
    pub workspace: Option<PathBuf>,
}

impl RunResult {
    pub fn artifact_names(&self) -> Vec<&str> {
        self.artifacts.keys().map(String::as_str).collect()
    }
}

pub struct Harness {
    root: TempDir,
    status: i32,
    sleep_secs: u64,
    envs: Vec<(String, String)>,
}

impl Harness {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        for dir in ["artifacts", "workspaces"] {
            std::fs::create_dir_all(root.path().join(dir)).expect("create harness dir");
        }
        Harness {
            root,
            status: 0,
            sleep_secs: 0,
            envs: Vec::new(),
        }
    }

    pub fn evaluator_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn evaluator_sleep(mut self, secs: u64) -> Self {
        self.sleep_secs = secs;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.root.path().join("workspaces")
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.path().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn run(&self, args: &[&str]) -> RunResult {
        self.run_with_stdin(args, None)
    }

    /// File the evaluator writes its workspace path into once it starts.
    pub fn workspace_file(&self) -> PathBuf {
        self.root.path().join("workspace.txt")
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.root.path().join("artifacts")
    }

    pub fn run_with_stdin(&self, args: &[&str], stdin: Option<&str>) -> RunResult {
        let mut child = self.spawn(args);
        if let Some(mut pipe) = child.stdin.take() {
            if let Some(text) = stdin {
                pipe.write_all(text.as_bytes()).expect("write stdin");
            }
        }
        self.wait(child)
    }

    /// Start `gatekeeper` without waiting for it.
    pub fn spawn(&self, args: &[&str]) -> Child {
        let evaluator = serde_json::json!({
            "command": ["sh", "-c", FAKE_EVALUATOR, "fake-evaluator"]
        });

        let mut command = Command::new(env!("CARGO_BIN_EXE_gatekeeper"));
        command
            .arg("--workspace-root")
            .arg(self.workspace_root())
            .args(args)
            .env("GATEKEEPER_EVALUATOR_COMMAND", evaluator.to_string())
            .env("GATEKEEPER_TEST_WORKSPACE_FILE", self.workspace_file())
            .env("GATEKEEPER_TEST_ARTIFACTS", self.artifacts_dir())
            .env("GATEKEEPER_TEST_STATUS", self.status.to_string())
            .env("GATEKEEPER_TEST_SLEEP", self.sleep_secs.to_string())
            .env_remove("RUST_LOG")
            .env_remove("GATEKEEPER_TIMEOUT_SECS")
            .env_remove("GATEKEEPER_MAX_DOCUMENT_BYTES")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command.spawn().expect("spawn gatekeeper")
    }

    /// Wait for a spawned `gatekeeper` and collect what it left behind.
    pub fn wait(&self, child: Child) -> RunResult {
        let output = child.wait_with_output().expect("wait gatekeeper");

        let mut artifacts = BTreeMap::new();
        for entry in std::fs::read_dir(self.artifacts_dir()).expect("read artifacts") {
            let entry = entry.expect("artifact entry");
            let bytes = std::fs::read(entry.path()).expect("read artifact");
            let value: Value = serde_json::from_slice(&bytes).expect("artifact is JSON");
            artifacts.insert(entry.file_name().to_string_lossy().into_owned(), value);
        }
        let workspace = std::fs::read_to_string(self.workspace_file())
            .ok()
            .map(PathBuf::from);

        RunResult {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            artifacts,
            workspace,
        }
    }
}
