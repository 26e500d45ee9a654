//! Plan generation.
//!
//! The planner decides where every scanned file goes. It never moves anything
//! and knows nothing about files on disk that were not part of the scan; the
//! only filesystem access is resolving real paths for the already-in-place
//! check.

use crate::context::{ConflictMode, OrganizeContext};
use crate::path_utils::{target_path, with_suffix};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Why a planned file is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Source and target resolve to the same file.
    AlreadyInPlace,
    /// Another file in this run already claimed the target.
    Collision,
}

/// Planned outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "detail", rename_all = "snake_case")]
pub enum Action {
    Moved,
    Skipped(SkipReason),
    Error(String),
}

/// One entry of an organize plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOrganizeResult {
    pub source: PathBuf,
    /// Empty when no target could be computed.
    pub target: PathBuf,
    pub action: Action,
}

impl FileOrganizeResult {
    pub fn is_move(&self) -> bool {
        self.action == Action::Moved
    }
}

/// Builds the plan for `files`.
///
/// Files are handled in lexicographic order so an unchanged input always
/// yields the same plan. A file missing from `dates` becomes an error entry.
/// Files already sitting at their target keep it, even against a file that
/// sorts earlier.
pub fn plan(
    files: &[PathBuf],
    dates: &HashMap<PathBuf, DateTime<Local>>,
    ctx: &OrganizeContext,
) -> Vec<FileOrganizeResult> {
    let mut ordered: Vec<&PathBuf> = files.iter().collect();
    ordered.sort();

    let placements: Vec<Placement> = ordered
        .into_iter()
        .map(|source| Placement::compute(source, dates.get(source), ctx))
        .collect();

    let mut allocator = TargetAllocator::default();
    for placement in &placements {
        if let Placement::InPlace { target, .. } = placement {
            allocator.claim(target.clone());
        }
    }

    placements
        .into_iter()
        .map(|placement| placement.resolve(ctx, &mut allocator))
        .collect()
}

/// Where a file would go before intra-run collisions are considered.
enum Placement<'a> {
    Undated { source: &'a Path },
    InPlace { source: &'a Path, target: PathBuf },
    Pending { source: &'a Path, target: PathBuf },
}

impl<'a> Placement<'a> {
    fn compute(source: &'a Path, date: Option<&DateTime<Local>>, ctx: &OrganizeContext) -> Self {
        let (Some(date), Some(file_name)) = (date, source.file_name()) else {
            return Placement::Undated { source };
        };
        let target = target_path(&ctx.output_dir, date, ctx.depth, file_name);
        if same_file(source, &target) {
            Placement::InPlace { source, target }
        } else {
            Placement::Pending { source, target }
        }
    }

    fn resolve(self, ctx: &OrganizeContext, allocator: &mut TargetAllocator) -> FileOrganizeResult {
        let (source, target, action) = match self {
            Placement::Undated { source } => (
                source,
                PathBuf::new(),
                Action::Error("no usable date".to_string()),
            ),
            Placement::InPlace { source, target } => {
                (source, target, Action::Skipped(SkipReason::AlreadyInPlace))
            }
            Placement::Pending { source, target } if !allocator.is_claimed(&target) => {
                allocator.claim(target.clone());
                (source, target, Action::Moved)
            }
            Placement::Pending { source, target } if ctx.conflict_mode == ConflictMode::Skip => {
                (source, target, Action::Skipped(SkipReason::Collision))
            }
            Placement::Pending { source, target } => {
                let renamed = allocator.claim_unique(&target);
                (source, renamed, Action::Moved)
            }
        };
        FileOrganizeResult {
            source: source.to_path_buf(),
            target,
            action,
        }
    }
}

/// True when both paths exist and resolve to the same location.
fn same_file(source: &Path, target: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// In-memory record of targets handed out during one plan.
#[derive(Debug, Default)]
struct TargetAllocator {
    claimed: HashSet<PathBuf>,
    // Next suffix to try per base target, so many same-named files stay O(n).
    next_suffix: HashMap<PathBuf, usize>,
}

impl TargetAllocator {
    fn is_claimed(&self, path: &Path) -> bool {
        self.claimed.contains(path)
    }

    fn claim(&mut self, path: PathBuf) {
        self.claimed.insert(path);
    }

    fn claim_unique(&mut self, base: &Path) -> PathBuf {
        let counter = self.next_suffix.entry(base.to_path_buf()).or_insert(1);
        loop {
            let candidate = with_suffix(base, *counter);
            *counter += 1;
            if !self.claimed.contains(&candidate) {
                self.claimed.insert(candidate.clone());
                return candidate;
            }
        }
    }
}
