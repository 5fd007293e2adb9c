use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Empties the temporary directory after shutdown, keeping log files.
pub fn cleanup_tmp(dir: &str) -> anyhow::Result<usize> {
    let dir = Path::new(dir);
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_some_and(|ext| ext == "log") {
            continue;
        }
        if let Err(e) = fs::remove_file(&path) {
            warn!("Failed to delete temporary file {:?}: {}", path, e);
        } else {
            debug!("Cleaned up temporary file: {:?}", path);
            removed += 1;
        }
    }
    Ok(removed)
}
