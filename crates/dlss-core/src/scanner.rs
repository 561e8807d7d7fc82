//! Recursive file-by-name lookup inside a game directory.
//!
//! Directory entries are visited in file-name order so repeated scans of the
//! same tree always agree on which duplicate is reported.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Every file named `file_name` under `root`, in traversal order.
///
/// # Errors
/// Returns [`ScanError::NotADirectory`] when `root` is not a directory.
pub fn find_all_by_name(root: &Path, file_name: &str) -> Result<Vec<PathBuf>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut matches = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("Skipping unreadable entry while scanning: {error}");
                continue;
            }
        };

        if entry.file_type().is_file() && entry.file_name() == file_name {
            matches.push(entry.into_path());
        }
    }

    debug!(
        "Found {} match(es) for {file_name} under {}",
        matches.len(),
        root.display()
    );
    Ok(matches)
}

/// The last file named `file_name` encountered under `root`.
///
/// When a tree holds several files with that name the one visited last wins,
/// matching what repeated overwrites during a walk would produce.
///
/// # Errors
/// Returns [`ScanError::NotADirectory`] when `root` is not a directory.
pub fn find_by_name(root: &Path, file_name: &str) -> Result<Option<PathBuf>, ScanError> {
    Ok(find_all_by_name(root, file_name)?.pop())
}
