//! Sequencing of an organize run.
//!
//! A run goes Scanning → Dating → Planning (`prepare`), then Moving →
//! CleaningUp (`execute`). Dry runs stop after planning; nothing on disk is
//! touched.

use crate::cleanup::remove_empty_dirs;
use crate::config::CompiledFilters;
use crate::context::OrganizeContext;
use crate::date_resolver::resolve_date;
use crate::error::{OrganizeError, Result};
use crate::mover::{FileMover, MoveOutcome};
use crate::planner::{self, Action, FileOrganizeResult};
use crate::scanner::{self, MAX_SCAN_DEPTH, ScanOptions};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Scanning,
    Dating,
    Planning,
    Moving,
    CleaningUp,
    Done,
    Failed,
}

/// Aggregate counts for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizeSummary {
    pub total_files: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub directories_created: usize,
    pub dry_run: bool,
}

/// A computed plan waiting to be executed.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub source_root: PathBuf,
    pub plan: Vec<FileOrganizeResult>,
}

impl PreparedRun {
    /// Entries that will actually move a file.
    pub fn pending_moves(&self) -> usize {
        self.plan.iter().filter(|entry| entry.is_move()).count()
    }
}

/// Drives one organize run for a fixed context.
pub struct Organizer {
    ctx: OrganizeContext,
    filters: CompiledFilters,
    phase: Phase,
}

impl Organizer {
    pub fn new(ctx: OrganizeContext) -> Self {
        Self::with_filters(ctx, CompiledFilters::default())
    }

    /// Creates an organizer that drops scanned files rejected by `filters`.
    pub fn with_filters(ctx: OrganizeContext, filters: CompiledFilters) -> Self {
        Self {
            ctx,
            filters,
            phase: Phase::Idle,
        }
    }

    pub fn context(&self) -> &OrganizeContext {
        &self.ctx
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
    }

    fn fail<T>(&mut self, error: OrganizeError) -> Result<T> {
        warn!(%error, phase = ?self.phase, "organize run aborted");
        self.phase = Phase::Failed;
        Err(error)
    }

    /// Scans, dates and plans `source_root`.
    pub fn prepare(&mut self, source_root: &Path) -> Result<PreparedRun> {
        if !source_root.is_dir() {
            return self.fail(OrganizeError::SourceNotFound {
                path: source_root.to_path_buf(),
            });
        }

        self.enter(Phase::Scanning);
        let options = ScanOptions {
            recursive: self.ctx.recursive,
            follow_symlinks: self.ctx.follow_symlinks,
            include_hidden: self.ctx.include_hidden,
            max_depth: MAX_SCAN_DEPTH,
            output_dir: Some(self.ctx.output_dir.clone()),
        };
        let mut files = match scanner::scan(source_root, &options) {
            Ok(files) => files,
            Err(e) => return self.fail(e),
        };
        if !self.filters.is_empty() {
            files.retain(|file| {
                let relative = file.strip_prefix(source_root).unwrap_or(file);
                self.filters.should_include(relative)
            });
        }
        info!(files = files.len(), root = %source_root.display(), "scan finished");

        let dates = self.date_files(&files)?;

        self.enter(Phase::Planning);
        let plan = planner::plan(&files, &dates, &self.ctx);

        Ok(PreparedRun {
            source_root: source_root.to_path_buf(),
            plan,
        })
    }

    /// Resolves the bucketing date of every file.
    ///
    /// Files that cannot be dated are left out of the map, so the planner
    /// records them as errors. With `fail_fast` the first failure aborts.
    pub fn date_files(&mut self, files: &[PathBuf]) -> Result<HashMap<PathBuf, DateTime<Local>>> {
        self.enter(Phase::Dating);
        let mut dates = HashMap::with_capacity(files.len());
        for file in files {
            match resolve_date(file, self.ctx.date_source) {
                Ok(date) => {
                    dates.insert(file.clone(), date);
                }
                Err(e) if self.ctx.fail_fast => return self.fail(e.into()),
                Err(e) => warn!(error = %e, "could not date file"),
            }
        }
        Ok(dates)
    }

    /// Carries out a prepared plan, calling `on_progress(done, total, source)`
    /// after each planned move.
    pub fn execute<F>(&mut self, prepared: &PreparedRun, mut on_progress: F) -> Result<OrganizeSummary>
    where
        F: FnMut(usize, usize, &Path),
    {
        let mut summary = OrganizeSummary {
            total_files: prepared.plan.len(),
            dry_run: self.ctx.dry_run,
            ..Default::default()
        };
        for entry in &prepared.plan {
            match entry.action {
                Action::Moved => summary.processed += 1,
                Action::Skipped(_) => summary.skipped += 1,
                Action::Error(_) => summary.errors += 1,
            }
        }

        if self.ctx.dry_run {
            self.enter(Phase::Done);
            return Ok(summary);
        }

        self.enter(Phase::Moving);
        let total = prepared.pending_moves();
        let mut done = 0;
        for entry in prepared.plan.iter().filter(|entry| entry.is_move()) {
            let outcome = FileMover::move_file(
                &entry.source,
                &entry.target,
                &prepared.source_root,
                &self.ctx.output_dir,
                self.ctx.conflict_mode,
            );
            match outcome {
                Ok(outcome) => {
                    if outcome.created_dir() {
                        summary.directories_created += 1;
                    }
                    if matches!(outcome, MoveOutcome::TargetExists | MoveOutcome::AlreadyInPlace) {
                        summary.processed -= 1;
                        summary.skipped += 1;
                    }
                }
                Err(e) if self.ctx.fail_fast => return self.fail(e.into()),
                Err(e) => {
                    warn!(error = %e, "move failed");
                    summary.processed -= 1;
                    summary.errors += 1;
                }
            }
            done += 1;
            on_progress(done, total, &entry.source);
        }

        if self.ctx.clean_empty {
            self.enter(Phase::CleaningUp);
            if let Err(e) = remove_empty_dirs(&prepared.source_root, &prepared.source_root) {
                return self.fail(e);
            }
        }

        self.enter(Phase::Done);
        info!(?summary, "organize run finished");
        Ok(summary)
    }

    /// Prepares and executes in one go.
    pub fn run(&mut self, source_root: &Path) -> Result<OrganizeSummary> {
        let prepared = self.prepare(source_root)?;
        self.execute(&prepared, |_, _, _| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConflictMode;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let src = temp.path().join("src");
        let out = temp.path().join("out");
        fs::create_dir(&src).unwrap();
        (temp, src, out)
    }

    #[test]
    fn test_missing_source_fails() {
        let (_temp, src, out) = setup();
        let mut organizer = Organizer::new(OrganizeContext::new(out));

        let result = organizer.run(&src.join("nope"));

        assert!(matches!(result, Err(OrganizeError::SourceNotFound { .. })));
        assert_eq!(organizer.phase(), Phase::Failed);
    }

    #[test]
    fn test_run_moves_and_counts() {
        let (_temp, src, out) = setup();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("b.txt"), "b").unwrap();
        let mut organizer = Organizer::new(OrganizeContext::new(&out));

        let summary = organizer.run(&src).unwrap();

        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.errors, 0);
        assert!(summary.directories_created >= 1);
        assert_eq!(organizer.phase(), Phase::Done);
        assert!(!src.join("a.txt").exists());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let (_temp, src, out) = setup();
        fs::write(src.join("a.txt"), "a").unwrap();
        let mut ctx = OrganizeContext::new(&out);
        ctx.dry_run = true;
        ctx.clean_empty = true;

        let summary = Organizer::new(ctx).run(&src).unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.directories_created, 0);
        assert!(src.join("a.txt").exists());
        assert!(!out.exists());
    }

    #[test]
    fn test_disk_conflict_skip_counts_as_skipped() {
        let (_temp, src, out) = setup();
        fs::write(src.join("a.txt"), "new").unwrap();
        let mut ctx = OrganizeContext::new(&out);
        ctx.conflict_mode = ConflictMode::Skip;
        let mut organizer = Organizer::new(ctx);

        let prepared = organizer.prepare(&src).unwrap();
        let target = &prepared.plan[0].target;
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(target, "old").unwrap();

        let summary = organizer.execute(&prepared, |_, _, _| {}).unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(fs::read_to_string(target).unwrap(), "old");
        assert!(src.join("a.txt").exists());
    }

    #[test]
    fn test_progress_reports_each_move() {
        let (_temp, src, out) = setup();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(src.join(name), name).unwrap();
        }
        let mut organizer = Organizer::new(OrganizeContext::new(&out));
        let prepared = organizer.prepare(&src).unwrap();
        assert_eq!(prepared.pending_moves(), 3);

        let mut calls = Vec::new();
        organizer
            .execute(&prepared, |done, total, _| calls.push((done, total)))
            .unwrap();

        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_undatable_file_aborts_with_fail_fast() {
        let (_temp, src, out) = setup();
        let vanished = src.join("vanished.jpg");
        let mut ctx = OrganizeContext::new(&out);
        ctx.fail_fast = true;
        let mut organizer = Organizer::new(ctx);

        let result = organizer.date_files(&[vanished.clone()]);

        match result {
            Err(OrganizeError::Date(e)) => assert_eq!(e.path, vanished),
            other => panic!("expected a date error, got {:?}", other),
        }
        assert_eq!(organizer.phase(), Phase::Failed);
    }

    #[test]
    fn test_undatable_file_becomes_error_entry() {
        let (_temp, src, out) = setup();
        let present = src.join("present.jpg");
        fs::write(&present, "p").unwrap();
        let vanished = src.join("vanished.jpg");
        let files = vec![present.clone(), vanished.clone()];
        let mut organizer = Organizer::new(OrganizeContext::new(&out));

        let dates = organizer.date_files(&files).unwrap();
        assert!(dates.contains_key(&present));
        assert!(!dates.contains_key(&vanished));

        let prepared = PreparedRun {
            source_root: src.clone(),
            plan: planner::plan(&files, &dates, organizer.context()),
        };
        let entry = prepared.plan.iter().find(|e| e.source == vanished).unwrap();
        assert!(matches!(entry.action, Action::Error(_)));

        let summary = organizer.execute(&prepared, |_, _, _| {}).unwrap();
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.processed, 1);
    }
}
