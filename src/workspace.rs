//! Scoped workspace directory holding one run's artifacts.
use std::path::Path;
use tempfile::TempDir;

use crate::error::{GatekeeperError, Result};
use crate::interrupt;

const WORKSPACE_PREFIX: &str = ".gatekeeper-conftest-";

/// A fresh directory removed when the value is dropped, on every exit path.
pub struct Workspace {
    _registration: interrupt::Registration,
    dir: TempDir,
}

impl Workspace {
    /// Create a new workspace under `root`, or the system temp dir.
    pub fn acquire(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|err| GatekeeperError::Workspace(format!("create workspace: {err}")))?;
        let registration = interrupt::register(dir.path());
        tracing::debug!(path = %dir.path().display(), "acquired workspace");
        Ok(Workspace {
            _registration: registration,
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn release(self) -> Result<()> {
        let Workspace {
            _registration,
            dir,
        } = self;
        let path = dir.path().to_path_buf();
        dir.close()
            .map_err(|err| GatekeeperError::Workspace(format!("remove {}: {err}", path.display())))?;
        tracing::debug!(path = %path.display(), "released workspace");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_removes_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::acquire(Some(root.path())).expect("acquire");
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("a.json"), b"{}").expect("write");
        workspace.release().expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let path = {
            let workspace = Workspace::acquire(Some(root.path())).expect("acquire");
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn workspaces_are_distinct() {
        let root = tempfile::tempdir().expect("tempdir");
        let first = Workspace::acquire(Some(root.path())).expect("acquire");
        let second = Workspace::acquire(Some(root.path())).expect("acquire");
        assert_ne!(first.path(), second.path());
        assert!(first
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(WORKSPACE_PREFIX)));
    }

    #[test]
    fn missing_root_is_a_workspace_error() {
        let root = tempfile::tempdir().expect("tempdir");
        let err = Workspace::acquire(Some(&root.path().join("absent")))
            .err()
            .expect("missing root");
        assert!(matches!(err, GatekeeperError::Workspace(_)));
    }
}
