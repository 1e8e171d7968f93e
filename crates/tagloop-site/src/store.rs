//! JSON files used as small registries.
//!
//! Loads are forgiving: a missing or unparsable file reads as the empty
//! value, so a damaged registry never blocks the session. Saves write a
//! temporary sibling and rename it over the target.
//!
//! Each operation is a read-modify-write with no locking; two sessions
//! sharing one working directory can lose updates.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, warn};

/// Read `path` as `T`, or `T::default()` if it is missing or corrupt.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(_) => return T::default(),
    };
    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            warn!("Treating corrupt registry {} as empty: {e}", path.display());
            T::default()
        }
    }
}

/// Write `value` as pretty JSON via a temp file and rename.
pub fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let dir = path
        .parent()
        .ok_or_else(|| format!("registry path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(dir).map_err(|e| format!("failed to create {}: {e}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{file_name}.tmp"));

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize {file_name}: {e}"))?;
    std::fs::write(&tmp_path, json).map_err(|e| format!("failed to write {file_name}: {e}"))?;
    std::fs::rename(&tmp_path, path).map_err(|e| format!("failed to replace {file_name}: {e}"))?;
    debug!("Saved registry {}", path.display());
    Ok(())
}
