//! Error taxonomy shared by every pipeline stage.
//!
//! Only [`GatekeeperError::MalformedWorkload`] is recovered locally (per
//! document); every other variant aborts the run.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatekeeperError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("document {index} exceeds the {limit} byte limit")]
    DocumentTooLarge { index: usize, limit: usize },

    #[error("malformed {kind}: {path}: {reason}")]
    MalformedWorkload {
        kind: String,
        path: String,
        reason: String,
    },

    #[error("serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("write artifact {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("start evaluator {program:?}: {source}")]
    EvaluatorInvocation {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("evaluator did not finish within {secs}s")]
    EvaluatorTimeout { secs: u64 },

    #[error("evaluator terminated without an exit status")]
    EvaluatorSignaled,

    #[error("workspace: {0}")]
    Workspace(String),

    #[error("interrupted")]
    Interrupted,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl GatekeeperError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        GatekeeperError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatekeeperError>;
