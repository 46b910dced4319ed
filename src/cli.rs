//! CLI argument parsing.
//!
//! Everything after the manifest argument is forwarded to the evaluator, so
//! `gatekeeper deploy.yaml -- --policy policies/` passes `--policy policies/`
//! through untouched.
use clap::Parser;
use std::path::PathBuf;

use crate::split::DEFAULT_MAX_DOCUMENT_BYTES;

/// Default evaluator wall-clock limit.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Parser, Debug)]
#[command(
    name = "gatekeeper",
    version,
    about = "Make manifests compatible with Gatekeeper constraint templates and test them with conftest",
    long_about = "Wraps every document of a Kubernetes manifest stream into the input shape \
                  Gatekeeper constraint templates expect (input.review.object), adds a second \
                  input for the pod template of workload controllers, and runs the evaluator \
                  (conftest test by default) over the result.",
    after_help = "Examples:\n  gatekeeper deploy.yaml\n  gatekeeper -p params.yaml deploy.yaml -- --policy policies/\n  kustomize build . | gatekeeper -"
)]
pub struct RootArgs {
    /// Manifest file to test, or `-` for standard input
    #[arg(value_name = "INPUT")]
    pub input: Option<String>,

    /// Arguments forwarded to the evaluator after the workspace path
    #[arg(value_name = "EVALUATOR_ARGS")]
    pub forward: Vec<String>,

    /// Path to a file containing parameter values used in constraint templates
    #[arg(short = 'p', long, value_name = "PATH")]
    pub parameters: Option<PathBuf>,

    /// Evaluator time limit in seconds (0 disables the limit)
    #[arg(
        long,
        value_name = "SECS",
        env = "GATEKEEPER_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub timeout_secs: u64,

    /// Largest accepted size of a single manifest document
    #[arg(
        long,
        value_name = "BYTES",
        env = "GATEKEEPER_MAX_DOCUMENT_BYTES",
        default_value_t = DEFAULT_MAX_DOCUMENT_BYTES
    )]
    pub max_document_bytes: usize,

    /// Directory in which the temporary workspace is created
    #[arg(long, value_name = "DIR", env = "GATEKEEPER_WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    /// Emit debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
