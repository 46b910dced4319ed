//! Run settings resolved from CLI flags and the environment.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::RootArgs;

pub const EVALUATOR_COMMAND_ENV: &str = "GATEKEEPER_EVALUATOR_COMMAND";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EvaluatorCommandConfig {
    command: Vec<String>,
}

/// Everything a run needs besides the manifest stream itself.
#[derive(Debug, Clone)]
pub struct Settings {
    pub evaluator_command: Vec<String>,
    pub timeout: Option<Duration>,
    pub max_document_bytes: usize,
    pub workspace_root: Option<PathBuf>,
}

impl Settings {
    pub fn from_args(args: &RootArgs) -> Result<Self> {
        let evaluator_command = load_evaluator_command()?;
        if args.max_document_bytes == 0 {
            return Err(anyhow!("--max-document-bytes must be greater than zero"));
        }
        if let Some(root) = &args.workspace_root {
            if !root.is_dir() {
                return Err(anyhow!(
                    "workspace root {} is not a directory",
                    root.display()
                ));
            }
        }
        Ok(Settings {
            evaluator_command,
            timeout: timeout_from_secs(args.timeout_secs),
            max_document_bytes: args.max_document_bytes,
            workspace_root: args.workspace_root.clone(),
        })
    }
}

/// Load the evaluator command, falling back to `conftest test`.
pub fn load_evaluator_command() -> Result<Vec<String>> {
    match env::var(EVALUATOR_COMMAND_ENV) {
        Ok(raw) => {
            parse_command_config(&raw).with_context(|| format!("parse {EVALUATOR_COMMAND_ENV}"))
        }
        Err(_) => Ok(default_evaluator_command()),
    }
}

fn parse_command_config(raw: &str) -> Result<Vec<String>> {
    let config: EvaluatorCommandConfig =
        serde_json::from_str(raw).context("parse evaluator command JSON")?;
    if config.command.is_empty() {
        return Err(anyhow!("evaluator command is empty"));
    }
    Ok(config.command)
}

fn default_evaluator_command() -> Vec<String> {
    vec!["conftest".to_string(), "test".to_string()]
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
