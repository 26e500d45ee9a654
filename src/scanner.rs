//! Source tree traversal.
//!
//! The scanner yields a flat, sorted list of candidate files. Cycle detection
//! is driven by a [`FolderContext`] that the traversal threads through every
//! descent; nothing is kept once `scan` returns.

use crate::error::OrganizeError;
use crate::path_utils::is_hidden;
use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hard ceiling on directory nesting, independent of the output bucket depth.
pub const MAX_SCAN_DEPTH: usize = 64;

/// Identity of a directory on disk.
#[cfg(unix)]
pub type DirId = (u64, u64);

#[cfg(not(unix))]
pub type DirId = PathBuf;

#[cfg(unix)]
fn dir_id(_path: &Path, metadata: &Metadata) -> Option<DirId> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn dir_id(path: &Path, _metadata: &Metadata) -> Option<DirId> {
    fs::canonicalize(path).ok()
}

/// Traversal state for one scan: directories already entered and the current depth.
#[derive(Debug, Clone)]
pub struct FolderContext {
    visited: HashSet<DirId>,
    depth: usize,
    max_depth: usize,
}

impl FolderContext {
    pub fn new(max_depth: usize) -> Self {
        Self {
            visited: HashSet::new(),
            depth: 0,
            max_depth,
        }
    }

    /// Records `id` as entered. Returns false if it was entered before.
    pub fn enter(&mut self, id: DirId) -> bool {
        self.visited.insert(id)
    }

    pub fn has_visited(&self, id: &DirId) -> bool {
        self.visited.contains(id)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether a child directory one level down may still be entered.
    pub fn can_descend(&self) -> bool {
        self.depth < self.max_depth
    }

    fn descend(&mut self) {
        self.depth += 1;
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Options controlling what the scanner reports.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub recursive: bool,
    pub follow_symlinks: bool,
    pub include_hidden: bool,
    pub max_depth: usize,
    /// Anything resolving under this directory is never reported.
    pub output_dir: Option<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            follow_symlinks: false,
            include_hidden: false,
            max_depth: MAX_SCAN_DEPTH,
            output_dir: None,
        }
    }
}

/// What a directory entry turned out to be once the symlink policy is applied.
enum EntryKind {
    File,
    Dir(Metadata),
    Ignored,
}

/// Lists candidate files under `start_dir`, sorted lexicographically.
///
/// Fails only when `start_dir` itself cannot be read. Unreadable or vanished
/// entries further down are skipped.
pub fn scan(start_dir: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>, OrganizeError> {
    let root_meta = fs::metadata(start_dir).map_err(|e| OrganizeError::Scan {
        path: start_dir.to_path_buf(),
        source: e,
    })?;
    let entries = fs::read_dir(start_dir).map_err(|e| OrganizeError::Scan {
        path: start_dir.to_path_buf(),
        source: e,
    })?;

    let output_dir = options
        .output_dir
        .as_deref()
        .and_then(|dir| fs::canonicalize(dir).ok());
    let scanner = Scanner {
        options,
        output_dir,
    };

    let mut ctx = FolderContext::new(options.max_depth);
    if let Some(id) = dir_id(start_dir, &root_meta) {
        ctx.enter(id);
    }

    let mut files = Vec::new();
    scanner.scan_entries(entries, &mut ctx, &mut files);
    files.sort();

    debug!(
        root = %start_dir.display(),
        files = files.len(),
        directories = ctx.visited.len(),
        "scan complete"
    );
    Ok(files)
}

struct Scanner<'a> {
    options: &'a ScanOptions,
    output_dir: Option<PathBuf>,
}

impl Scanner<'_> {
    fn scan_dir(&self, dir: &Path, ctx: &mut FolderContext, files: &mut Vec<PathBuf>) {
        match fs::read_dir(dir) {
            Ok(entries) => self.scan_entries(entries, ctx, files),
            Err(e) => debug!(path = %dir.display(), error = %e, "skipping unreadable directory"),
        }
    }

    fn scan_entries(&self, entries: fs::ReadDir, ctx: &mut FolderContext, files: &mut Vec<PathBuf>) {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if !self.options.include_hidden && is_hidden(&entry.file_name()) {
                continue;
            }

            let path = entry.path();
            if self.is_under_output(&path) {
                continue;
            }

            match self.classify(&path) {
                EntryKind::File => files.push(path),
                EntryKind::Dir(metadata) if self.options.recursive => {
                    self.descend_into(&path, &metadata, ctx, files);
                }
                EntryKind::Dir(_) | EntryKind::Ignored => {}
            }
        }
    }

    fn descend_into(
        &self,
        dir: &Path,
        metadata: &Metadata,
        ctx: &mut FolderContext,
        files: &mut Vec<PathBuf>,
    ) {
        if !ctx.can_descend() {
            debug!(path = %dir.display(), depth = ctx.depth(), "maximum depth reached");
            return;
        }
        let Some(id) = dir_id(dir, metadata) else {
            return;
        };
        if ctx.has_visited(&id) {
            debug!(path = %dir.display(), "directory already visited, skipping");
            return;
        }
        ctx.enter(id);

        ctx.descend();
        self.scan_dir(dir, ctx, files);
        ctx.ascend();
    }

    /// Applies the symlink policy. Metadata of followed links is the target's.
    fn classify(&self, path: &Path) -> EntryKind {
        let link_meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "entry vanished");
                return EntryKind::Ignored;
            }
        };

        let metadata = if link_meta.file_type().is_symlink() {
            if !self.options.follow_symlinks {
                return EntryKind::Ignored;
            }
            match fs::metadata(path) {
                Ok(meta) => meta,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "broken symlink");
                    return EntryKind::Ignored;
                }
            }
        } else {
            link_meta
        };

        if metadata.is_file() {
            EntryKind::File
        } else if metadata.is_dir() {
            EntryKind::Dir(metadata)
        } else {
            EntryKind::Ignored
        }
    }

    fn is_under_output(&self, path: &Path) -> bool {
        let Some(output_dir) = &self.output_dir else {
            return false;
        };
        fs::canonicalize(path)
            .map(|resolved| resolved.starts_with(output_dir))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(path, b"x").expect("Failed to write file");
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_non_recursive_lists_direct_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("b.txt"));
        touch(&root.join("a.txt"));
        touch(&root.join("sub/c.txt"));

        let files = scan(root, &ScanOptions::default()).unwrap();
        assert_eq!(names(root, &files), vec!["a.txt", "b.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("locked/hidden_from_us.txt"));
        touch(&root.join("open/b.txt"));
        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still read it; nothing to check then.
        let still_readable = fs::read_dir(&locked).is_ok();
        let options = ScanOptions {
            recursive: true,
            ..Default::default()
        };
        let result = scan(root, &options);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if still_readable {
            return;
        }

        assert_eq!(names(root, &result.unwrap()), vec!["a.txt", "open/b.txt"]);
    }

    #[test]
    fn test_recursive_descends() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("a.txt"));
        touch(&root.join("sub/deeper/c.txt"));

        let options = ScanOptions {
            recursive: true,
            ..Default::default()
        };
        let files = scan(root, &options).unwrap();
        assert_eq!(names(root, &files), vec!["a.txt", "sub/deeper/c.txt"]);
    }

    #[test]
    fn test_hidden_entries_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join(".hidden"));
        touch(&root.join(".git/config"));
        touch(&root.join("shown.txt"));

        let options = ScanOptions {
            recursive: true,
            ..Default::default()
        };
        let files = scan(root, &options).unwrap();
        assert_eq!(names(root, &files), vec!["shown.txt"]);

        let options = ScanOptions {
            recursive: true,
            include_hidden: true,
            ..Default::default()
        };
        let files = scan(root, &options).unwrap();
        assert_eq!(names(root, &files), vec![".git/config", ".hidden", "shown.txt"]);
    }

    #[test]
    fn test_output_dir_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("new.jpg"));
        touch(&root.join("sorted/2024/old.jpg"));

        let options = ScanOptions {
            recursive: true,
            output_dir: Some(root.join("sorted")),
            ..Default::default()
        };
        let files = scan(root, &options).unwrap();
        assert_eq!(names(root, &files), vec!["new.jpg"]);
    }

    #[test]
    fn test_max_depth_abandons_deeper_levels() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("top.txt"));
        touch(&root.join("one/mid.txt"));
        touch(&root.join("one/two/deep.txt"));

        let options = ScanOptions {
            recursive: true,
            max_depth: 1,
            ..Default::default()
        };
        let files = scan(root, &options).unwrap();
        assert_eq!(names(root, &files), vec!["one/mid.txt", "top.txt"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan(&temp_dir.path().join("nope"), &ScanOptions::default());
        assert!(matches!(result, Err(OrganizeError::Scan { .. })));
    }

    #[test]
    fn test_folder_context_rejects_revisits() {
        let mut ctx = FolderContext::new(2);
        #[cfg(unix)]
        let id: DirId = (1, 42);
        #[cfg(not(unix))]
        let id: DirId = PathBuf::from("/a");

        assert!(ctx.enter(id.clone()));
        assert!(ctx.has_visited(&id));
        assert!(!ctx.enter(id));
        assert!(ctx.can_descend());
    }

    #[cfg(unix)]
    mod symlinks {
        use super::*;
        use std::os::unix::fs::symlink;

        #[test]
        fn test_symlinks_skipped_unless_followed() {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path();
            touch(&root.join("real.txt"));
            touch(&root.join("elsewhere/target.txt"));
            symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

            let files = scan(root, &ScanOptions::default()).unwrap();
            assert_eq!(names(root, &files), vec!["real.txt"]);

            let options = ScanOptions {
                follow_symlinks: true,
                ..Default::default()
            };
            let files = scan(root, &options).unwrap();
            assert_eq!(names(root, &files), vec!["link.txt", "real.txt"]);
        }

        #[test]
        fn test_followed_dir_link_reports_link_paths() {
            let temp_dir = TempDir::new().unwrap();
            let outside = TempDir::new().unwrap();
            let root = temp_dir.path();
            touch(&outside.path().join("inner.txt"));
            symlink(outside.path(), root.join("linked")).unwrap();

            let options = ScanOptions {
                recursive: true,
                follow_symlinks: true,
                ..Default::default()
            };
            let files = scan(root, &options).unwrap();
            assert_eq!(names(root, &files), vec!["linked/inner.txt"]);
        }

        #[test]
        fn test_symlink_loop_terminates() {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path();
            touch(&root.join("dirA/a.txt"));
            touch(&root.join("dirB/b.txt"));
            symlink(root.join("dirB"), root.join("dirA/link")).unwrap();
            symlink(root.join("dirA"), root.join("dirB/link")).unwrap();

            let options = ScanOptions {
                recursive: true,
                follow_symlinks: true,
                ..Default::default()
            };
            let files = scan(root, &options).unwrap();

            // Each real directory is entered exactly once.
            assert_eq!(files.len(), 2);
            assert!(files.iter().any(|f| f.ends_with("a.txt")));
            assert!(files.iter().any(|f| f.ends_with("b.txt")));
        }

        #[test]
        fn test_self_link_terminates() {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path();
            touch(&root.join("a.txt"));
            symlink(root, root.join("again")).unwrap();

            let options = ScanOptions {
                recursive: true,
                follow_symlinks: true,
                ..Default::default()
            };
            let files = scan(root, &options).unwrap();
            assert_eq!(names(root, &files), vec!["a.txt"]);
        }

        #[test]
        fn test_broken_link_ignored() {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path();
            symlink(root.join("missing"), root.join("dangling")).unwrap();

            let options = ScanOptions {
                follow_symlinks: true,
                ..Default::default()
            };
            assert!(scan(root, &options).unwrap().is_empty());
        }
    }
}
