//! External policy evaluator invocation.
//!
//! The pipeline only depends on the [`Evaluator`] trait; [`CommandEvaluator`]
//! runs a real subprocess (by default `conftest test`) with a wall-clock
//! limit.
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{GatekeeperError, Result};
use crate::interrupt;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of one evaluator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOutcome {
    /// Interleaved stdout and stderr, byte for byte.
    pub output: Vec<u8>,
    /// Exit status; zero means no findings.
    pub status: i32,
}

pub trait Evaluator {
    /// Evaluate every artifact under `workspace`, forwarding `args` verbatim.
    fn evaluate(&self, workspace: &Path, args: &[String]) -> Result<EvaluationOutcome>;
}

/// Runs `<argv…> <workspace> <args…>` as a child process.
pub struct CommandEvaluator {
    argv: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandEvaluator {
    pub fn new(argv: Vec<String>, timeout: Option<Duration>) -> Result<Self> {
        if argv.is_empty() {
            return Err(GatekeeperError::InvalidSettings(
                "evaluator command is empty".to_string(),
            ));
        }
        Ok(CommandEvaluator { argv, timeout })
    }

    fn program(&self) -> &str {
        &self.argv[0]
    }

    fn wait(&self, child: &mut Child) -> Result<i32> {
        let start = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|err| GatekeeperError::io("check evaluator status", err))?
            {
                return status.code().ok_or(GatekeeperError::EvaluatorSignaled);
            }
            if interrupt::requested() {
                stop(child);
                return Err(GatekeeperError::Interrupted);
            }
            if let Some(timeout) = self.timeout {
                if start.elapsed() > timeout {
                    stop(child);
                    return Err(GatekeeperError::EvaluatorTimeout {
                        secs: timeout.as_secs(),
                    });
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&self, workspace: &Path, args: &[String]) -> Result<EvaluationOutcome> {
        // Both streams share one file so the captured text keeps the order
        // the child wrote it in, and a chatty child can never fill a pipe.
        let mut capture =
            tempfile::tempfile().map_err(|err| GatekeeperError::io("create output capture", err))?;
        let stdout = capture
            .try_clone()
            .map_err(|err| GatekeeperError::io("share output capture", err))?;
        let stderr = capture
            .try_clone()
            .map_err(|err| GatekeeperError::io("share output capture", err))?;

        let mut command = Command::new(self.program());
        command
            .args(&self.argv[1..])
            .arg(workspace)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        tracing::info!(
            program = self.program(),
            workspace = %workspace.display(),
            forwarded = args.len(),
            "running evaluator"
        );
        let mut child = command
            .spawn()
            .map_err(|source| GatekeeperError::EvaluatorInvocation {
                program: self.program().to_string(),
                source,
            })?;
        // The command holds the parent's copies of the capture handles.
        drop(command);
        let status = self.wait(&mut child)?;
        let output = read_capture(&mut capture)?;
        tracing::info!(status, output_bytes = output.len(), "evaluator finished");
        Ok(EvaluationOutcome { output, status })
    }
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn read_capture(capture: &mut File) -> Result<Vec<u8>> {
    capture
        .seek(SeekFrom::Start(0))
        .map_err(|err| GatekeeperError::io("rewind output capture", err))?;
    let mut bytes = Vec::new();
    capture
        .read_to_end(&mut bytes)
        .map_err(|err| GatekeeperError::io("read output capture", err))?;
    Ok(bytes)
}
