//! SIGINT/SIGTERM handling.
//!
//! The handler only raises a flag that the pipeline polls. If the process is
//! still running once the grace period has passed, the handler removes every
//! registered workspace itself and exits.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{GatekeeperError, Result};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static WORKSPACES: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

pub fn install(grace: Duration, exit_code: i32) -> Result<()> {
    ctrlc::set_handler(move || {
        INTERRUPTED.store(true, Ordering::SeqCst);
        tracing::warn!("interrupt received, stopping");
        std::thread::sleep(grace);
        for path in workspaces().drain(..) {
            let _ = std::fs::remove_dir_all(&path);
        }
        std::process::exit(exit_code);
    })
    .map_err(|err| GatekeeperError::InvalidSettings(format!("install signal handler: {err}")))
}

pub fn requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Fail with [`GatekeeperError::Interrupted`] once a signal has arrived.
pub fn check() -> Result<()> {
    if requested() {
        return Err(GatekeeperError::Interrupted);
    }
    Ok(())
}

/// Keeps a directory on the forced-cleanup list until dropped.
pub struct Registration {
    path: PathBuf,
}

pub fn register(path: &Path) -> Registration {
    workspaces().push(path.to_path_buf());
    Registration {
        path: path.to_path_buf(),
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        workspaces().retain(|path| path != &self.path);
    }
}

fn workspaces() -> MutexGuard<'static, Vec<PathBuf>> {
    WORKSPACES
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
