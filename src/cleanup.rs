//! Removal of directories left empty after an organize run.

use crate::error::OrganizeError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upper bound on sweeps over the tree.
pub const MAX_CLEANUP_PASSES: usize = 16;

/// Removes empty directories below `start_dir`, deepest first.
///
/// Only directories whose real path is strictly inside `source_root` are
/// touched, and `start_dir` itself is kept. Symlinks are never followed.
/// Returns how many directories were removed.
pub fn remove_empty_dirs(start_dir: &Path, source_root: &Path) -> Result<usize, OrganizeError> {
    let real_root = fs::canonicalize(source_root).map_err(|e| OrganizeError::Cleanup {
        path: source_root.to_path_buf(),
        source: e,
    })?;
    fs::read_dir(start_dir).map_err(|e| OrganizeError::Cleanup {
        path: start_dir.to_path_buf(),
        source: e,
    })?;

    let mut removed = 0;
    for pass in 0..MAX_CLEANUP_PASSES {
        let mut dirs = Vec::new();
        collect_dirs(start_dir, &mut dirs);
        // Deepest paths first so children go before their parents.
        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

        let removed_this_pass = dirs
            .iter()
            .filter(|dir| is_inside(dir, &real_root) && is_empty_dir(dir))
            .filter(|dir| match fs::remove_dir(dir) {
                Ok(()) => {
                    debug!(path = %dir.display(), "removed empty directory");
                    true
                }
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "could not remove directory");
                    false
                }
            })
            .count();

        removed += removed_this_pass;
        if removed_this_pass == 0 {
            debug!(passes = pass + 1, removed, "cleanup finished");
            break;
        }
    }
    Ok(removed)
}

/// Every real (non-symlink) directory below `dir`.
fn collect_dirs(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if let Ok(file_type) = entry.file_type()
            && file_type.is_dir()
        {
            let path = entry.path();
            collect_dirs(&path, out);
            out.push(path);
        }
    }
}

fn is_inside(dir: &Path, real_root: &Path) -> bool {
    fs::canonicalize(dir)
        .map(|real| real != real_root && real.starts_with(real_root))
        .unwrap_or(false)
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
