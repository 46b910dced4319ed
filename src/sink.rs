//! Artifact persistence inside the run workspace.
use std::fs;
use std::path::PathBuf;

use crate::error::{GatekeeperError, Result};

pub const PRIMARY_SUFFIX: &str = "";
pub const POD_TEMPLATE_SUFFIX: &str = "_pods";

/// Writes envelope files named `<kind>_<name><suffix>.json` under one root.
///
/// Two documents with the same kind and name share a file name; the later
/// one replaces the earlier.
pub struct ArtifactSink {
    root: PathBuf,
}

impl ArtifactSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactSink { root: root.into() }
    }

    pub fn store(&self, kind: &str, name: &str, suffix: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(artifact_file_name(kind, name, suffix));
        if path.exists() {
            tracing::debug!(path = %path.display(), "overwriting artifact with the same kind and name");
        }
        fs::write(&path, bytes).map_err(|source| GatekeeperError::ArtifactWrite {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
        Ok(path)
    }
}

pub fn artifact_file_name(kind: &str, name: &str, suffix: &str) -> String {
    format!(
        "{}_{}{}.json",
        file_name_segment(kind),
        file_name_segment(name),
        suffix
    )
}

fn file_name_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect()
}
