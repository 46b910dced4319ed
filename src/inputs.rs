//! Manifest and parameters file access.
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::decode::decode;
use crate::error::{GatekeeperError, Result};

pub const STDIN_MARKER: &str = "-";

/// Open the manifest stream: a regular file, or stdin for `-`.
pub fn open_manifest(input: &str) -> Result<Box<dyn BufRead>> {
    if input == STDIN_MARKER {
        return Ok(Box::new(io::stdin().lock()));
    }
    let path = Path::new(input);
    ensure_file(path, "input")?;
    let file = File::open(path)
        .map_err(|err| GatekeeperError::io(format!("read input file {}", path.display()), err))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Load the `parameters` value from a parameters file.
///
/// A missing key or an empty file yields `null`.
pub fn load_parameters(path: &Path) -> Result<Value> {
    ensure_file(path, "parameters")?;
    let bytes = fs::read(path).map_err(|err| {
        GatekeeperError::io(format!("read parameters file {}", path.display()), err)
    })?;
    parameters_from_bytes(&bytes).map_err(|err| match err {
        GatekeeperError::MalformedInput(message) => GatekeeperError::MalformedInput(format!(
            "parameters file {}: {message}",
            path.display()
        )),
        other => other,
    })
}

fn parameters_from_bytes(bytes: &[u8]) -> Result<Value> {
    match decode(bytes)? {
        Value::Null => Ok(Value::Null),
        Value::Object(mut map) => Ok(map.remove("parameters").unwrap_or(Value::Null)),
        _ => Err(GatekeeperError::MalformedInput(
            "expected a mapping at the top level".to_string(),
        )),
    }
}

fn ensure_file(path: &Path, what: &str) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|err| {
        GatekeeperError::io(format!("get {what} file info {}", path.display()), err)
    })?;
    if metadata.is_dir() {
        return Err(GatekeeperError::io(
            format!("{what} {}", path.display()),
            io::Error::new(io::ErrorKind::InvalidInput, "Expecting file. Got directory."),
        ));
    }
    Ok(())
}
