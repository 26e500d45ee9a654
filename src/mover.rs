//! Execution of planned moves against the live filesystem.
//!
//! The mover is the only component that writes. Every move is checked
//! against the source and output roots before anything on disk changes, and
//! conflicts with files that already exist on disk (which the planner cannot
//! see) are resolved here.

use crate::context::ConflictMode;
use crate::error::MoveError;
use crate::path_utils::with_suffix;
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// What happened to a single planned move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The file now lives at `destination`.
    Moved {
        destination: PathBuf,
        /// A missing parent directory had to be created.
        created_dir: bool,
    },
    /// Source and target are already the same file.
    AlreadyInPlace,
    /// Something already occupies the target and the conflict mode skips.
    TargetExists,
}

impl MoveOutcome {
    pub fn created_dir(&self) -> bool {
        matches!(self, MoveOutcome::Moved { created_dir: true, .. })
    }
}

/// Moves files into the output tree.
pub struct FileMover;

impl FileMover {
    /// Moves `source` to `target`, enforcing root containment and resolving
    /// disk-level conflicts according to `mode`.
    ///
    /// Nothing is written unless the real location of `source` lies inside
    /// `source_root` and the real parent of `target` lies inside
    /// `output_root`.
    ///
    /// # Arguments
    ///
    /// * `source` - The file to move
    /// * `target` - Where the planner wants it
    /// * `source_root` - The directory the file must come from
    /// * `output_root` - The directory the file must end up in
    /// * `mode` - How to treat a target that already exists on disk
    ///
    /// # Returns
    ///
    /// Returns the [`MoveOutcome`], or a `MoveError` on a boundary violation
    /// or an OS-level failure.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use datesort::context::ConflictMode;
    /// use datesort::mover::FileMover;
    /// use std::path::Path;
    ///
    /// let outcome = FileMover::move_file(
    ///     Path::new("/photos/inbox/img.jpg"),
    ///     Path::new("/photos/sorted/2024/202401/20240115/img.jpg"),
    ///     Path::new("/photos/inbox"),
    ///     Path::new("/photos/sorted"),
    ///     ConflictMode::Rename,
    /// );
    /// match outcome {
    ///     Ok(outcome) => println!("{:?}", outcome),
    ///     Err(e) => eprintln!("Move failed: {}", e),
    /// }
    /// ```
    pub fn move_file(
        source: &Path,
        target: &Path,
        source_root: &Path,
        output_root: &Path,
        mode: ConflictMode,
    ) -> Result<MoveOutcome, MoveError> {
        let real_source_root = fs::canonicalize(source_root).map_err(|e| MoveError::Resolve {
            path: source_root.to_path_buf(),
            source: e,
        })?;
        let real_source = resolve_entry(source)?;
        if !real_source.starts_with(&real_source_root) {
            return Err(MoveError::OutsideSourceRoot {
                path: source.to_path_buf(),
                root: source_root.to_path_buf(),
            });
        }

        let (Some(target_parent), Some(file_name)) = (target.parent(), target.file_name()) else {
            return Err(MoveError::PathTraversal {
                path: target.to_path_buf(),
            });
        };
        let real_output_root = resolve_lenient(output_root)?;
        let real_parent = resolve_lenient(target_parent)?;
        if !real_parent.starts_with(&real_output_root) {
            return Err(MoveError::OutsideOutputRoot {
                path: target.to_path_buf(),
                root: output_root.to_path_buf(),
            });
        }
        let mut destination = real_parent.join(file_name);

        if fs::symlink_metadata(&destination).is_ok() {
            if is_same_file(&real_source, &destination) {
                return Ok(MoveOutcome::AlreadyInPlace);
            }
            if mode.skips_on_conflict() {
                debug!(target = %destination.display(), "target exists, skipping");
                return Ok(MoveOutcome::TargetExists);
            }
            if mode == ConflictMode::Rename {
                destination = unique_on_disk(&destination);
                debug!(target = %destination.display(), "target exists, renaming");
            } else {
                debug!(target = %destination.display(), "target exists, overwriting");
            }
        }

        let created_dir = if real_parent.is_dir() {
            false
        } else {
            fs::create_dir_all(&real_parent).map_err(|e| MoveError::CreateDir {
                path: real_parent.clone(),
                source: e,
            })?;
            true
        };

        if is_symlink(&real_source) {
            relink(&real_source, &destination)?;
        } else {
            rename_or_copy(&real_source, &destination)?;
        }
        Ok(MoveOutcome::Moved {
            destination,
            created_dir,
        })
    }
}

/// Real location of a directory entry: its parent resolved, the name kept.
///
/// The entry itself is not resolved, so a symlink is handled as a link.
fn resolve_entry(path: &Path) -> Result<PathBuf, MoveError> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(MoveError::PathTraversal {
            path: path.to_path_buf(),
        });
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let real_parent = fs::canonicalize(parent).map_err(|e| MoveError::Resolve {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(real_parent.join(name))
}

/// Resolves `path` through its nearest existing ancestor.
///
/// The part that does not exist yet may only contain plain names.
fn resolve_lenient(path: &Path) -> Result<PathBuf, MoveError> {
    for ancestor in path.ancestors() {
        let probe = if ancestor.as_os_str().is_empty() {
            Path::new(".")
        } else {
            ancestor
        };
        match fs::canonicalize(probe) {
            Ok(real) => {
                let rest = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
                if rest.components().any(|c| !matches!(c, Component::Normal(_))) {
                    return Err(MoveError::PathTraversal {
                        path: path.to_path_buf(),
                    });
                }
                return Ok(real.join(rest));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(MoveError::Resolve {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }
    }
    Err(MoveError::Resolve {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::NotFound, "no existing ancestor"),
    })
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// First `_n` variant of `path` that does not exist on disk.
fn unique_on_disk(path: &Path) -> PathBuf {
    let mut n = 1;
    loop {
        let candidate = with_suffix(path, n);
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        n += 1;
    }
}

/// Prefix of the staging entries created next to a destination.
const STAGING_PREFIX: &str = ".datesort-";

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// `rename`, falling back to a staged copy across filesystems.
fn rename_or_copy(from: &Path, to: &Path) -> Result<(), MoveError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "cross-device move, copying");
            copy_across(from, to)
        }
        Err(e) => Err(MoveError::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        }),
    }
}

/// Copies `from` into a staging file beside `to`, verifies the size, renames
/// it over `to` and only then removes `from`.
///
/// `to` is either left untouched or atomically replaced. Permissions and
/// timestamps travel with the content so the file keeps its date.
fn copy_across(from: &Path, to: &Path) -> Result<(), MoveError> {
    let move_error = |e: io::Error| MoveError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    };
    let parent = to.parent().ok_or_else(|| MoveError::PathTraversal {
        path: to.to_path_buf(),
    })?;

    let meta = fs::metadata(from).map_err(move_error)?;
    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(parent)
        .map_err(move_error)?;
    let mut reader = File::open(from).map_err(move_error)?;
    io::copy(&mut reader, staged.as_file_mut()).map_err(move_error)?;

    let mut times = FileTimes::new();
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    staged.as_file().set_times(times).map_err(move_error)?;
    staged.as_file().set_permissions(meta.permissions()).map_err(move_error)?;
    staged.as_file().sync_all().map_err(move_error)?;

    let expected = meta.len();
    let actual = staged.as_file().metadata().map_err(move_error)?.len();
    if actual != expected {
        // Dropping `staged` removes the partial copy.
        return Err(MoveError::CopyVerification {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            expected,
            actual,
        });
    }

    staged.persist(to).map_err(|e| move_error(e.error))?;
    fs::remove_file(from).map_err(move_error)
}

/// Moves a symlink by recreating it at `to` with an absolute target, then
/// removing the original link. Works the same within and across filesystems.
#[cfg(unix)]
fn relink(link: &Path, to: &Path) -> Result<(), MoveError> {
    let move_error = |e: io::Error| MoveError::Move {
        from: link.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    };
    let resolved = fs::canonicalize(link).map_err(|e| MoveError::Resolve {
        path: link.to_path_buf(),
        source: e,
    })?;
    let parent = to.parent().ok_or_else(|| MoveError::PathTraversal {
        path: to.to_path_buf(),
    })?;

    let staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .make_in(parent, |path| std::os::unix::fs::symlink(&resolved, path))
        .map_err(move_error)?;
    staged.persist(to).map_err(|e| move_error(e.error))?;
    fs::remove_file(link).map_err(move_error)
}

#[cfg(not(unix))]
fn relink(link: &Path, to: &Path) -> Result<(), MoveError> {
    rename_or_copy(link, to)
}
