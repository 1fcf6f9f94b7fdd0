//! Path and directory management.

use std::path::Path;

use crate::error::Result;
use crate::fs::naming::is_temp_file;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Delete in-progress download files left behind by an interrupted run.
///
/// Returns the number of files removed. A missing directory has nothing to
/// collect.
pub fn collect_garbage(dir: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_temp_file(&path) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!("Removed leftover {}", path.display());
                    removed += 1;
                }
                Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }

    if removed > 0 {
        tracing::info!("Removed {} incomplete download(s)", removed);
    }
    Ok(removed)
}
