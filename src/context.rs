//! Run configuration shared by every phase of an organize run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which timestamp a file is bucketed by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    /// Birth time when the platform reports a valid one, otherwise modification time.
    #[default]
    Created,
    /// Modification time.
    Modified,
}

/// How many date-derived directory levels sit between the output root and a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum BucketDepth {
    /// `20260110/`
    Day,
    /// `2026/20260110/`
    YearDay,
    /// `2026/202601/20260110/`
    #[default]
    YearMonthDay,
}

impl TryFrom<u8> for BucketDepth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Day),
            2 => Ok(Self::YearDay),
            3 => Ok(Self::YearMonthDay),
            other => Err(format!("depth must be 1, 2 or 3 (got {})", other)),
        }
    }
}

impl From<BucketDepth> for u8 {
    fn from(depth: BucketDepth) -> Self {
        match depth {
            BucketDepth::Day => 1,
            BucketDepth::YearDay => 2,
            BucketDepth::YearMonthDay => 3,
        }
    }
}

impl fmt::Display for BucketDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// What to do when a target path is already taken.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// Insert `_1`, `_2`, ... before the extension.
    #[default]
    Rename,
    /// Leave the file where it is.
    Skip,
    /// Replace whatever occupies the target.
    Overwrite,
    /// Renames within a run; skips targets that already exist on disk.
    Ask,
}

impl ConflictMode {
    /// Whether a file already on disk at the target leaves the source untouched.
    /// Ask has no interactive channel inside the engine, so it behaves as Skip.
    pub fn skips_on_conflict(self) -> bool {
        matches!(self, ConflictMode::Skip | ConflictMode::Ask)
    }
}

/// Immutable settings for one organize invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizeContext {
    pub date_source: DateSource,
    pub depth: BucketDepth,
    pub conflict_mode: ConflictMode,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub include_hidden: bool,
    pub recursive: bool,
    pub follow_symlinks: bool,
    pub clean_empty: bool,
    pub fail_fast: bool,
}

impl OrganizeContext {
    /// Creates a context with default settings writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            date_source: DateSource::default(),
            depth: BucketDepth::default(),
            conflict_mode: ConflictMode::default(),
            output_dir: output_dir.into(),
            dry_run: false,
            include_hidden: false,
            recursive: false,
            follow_symlinks: false,
            clean_empty: false,
            fail_fast: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_parses_only_known_levels() {
        assert_eq!(BucketDepth::try_from(1), Ok(BucketDepth::Day));
        assert_eq!(BucketDepth::try_from(2), Ok(BucketDepth::YearDay));
        assert_eq!(BucketDepth::try_from(3), Ok(BucketDepth::YearMonthDay));
        assert!(BucketDepth::try_from(0).is_err());
        assert!(BucketDepth::try_from(4).is_err());
    }

    #[test]
    fn ask_behaves_as_skip() {
        assert!(ConflictMode::Ask.skips_on_conflict());
        assert!(ConflictMode::Skip.skips_on_conflict());
        assert!(!ConflictMode::Rename.skips_on_conflict());
        assert!(!ConflictMode::Overwrite.skips_on_conflict());
    }

    #[test]
    fn defaults() {
        let ctx = OrganizeContext::new("/out");
        assert_eq!(ctx.date_source, DateSource::Created);
        assert_eq!(ctx.depth, BucketDepth::YearMonthDay);
        assert_eq!(ctx.conflict_mode, ConflictMode::Rename);
        assert!(!ctx.dry_run && !ctx.recursive && !ctx.follow_symlinks);
    }
}
