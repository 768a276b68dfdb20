//! Filesystem helpers shared by the transcode and sync stages.
//!
//! `ensure_directory` is the idempotent "make sure it exists" primitive every
//! stage calls before writing. `remove_quietly` is the unconditional cleanup
//! used once a run's artifacts are no longer owned by anyone.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

/// Ensures `path` exists, creating it and any missing parents.
///
/// Succeeds if something already exists at `path`. Concurrent callers racing
/// to create the same directory all succeed. Only a stat failure other than
/// "not found" (permission denied, for instance) is reported.
pub async fn ensure_directory(path: &Path) -> std::io::Result<()> {
    match fs::metadata(path).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => match fs::create_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Created directory");
                Ok(())
            }
            // Lost the race against another creator
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    }
}

/// Removes a file or directory tree, tolerating its absence.
///
/// Failures are logged and reported through the return value but never
/// escalated; cleanup is advisory. Returns `true` when nothing is left behind.
pub async fn remove_quietly(path: &Path) -> bool {
    let meta = match fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to stat path during cleanup");
            return false;
        }
    };

    let result = if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => {
            debug!(path = %path.display(), "Removed");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cleanup failed");
            false
        }
    }
}
