//! Command-line interface for datesort.
//!
//! ## Usage
//! ```bash
//! # Sort a camera dump into YYYY/YYYYMM/YYYYMMDD buckets by mtime
//! datesort ~/Downloads/camera --output ~/Photos --date-source modified
//!
//! # Preview only, two-level buckets, walk subdirectories
//! datesort ~/inbox -o ~/sorted --depth 2 --recursive --dry-run
//!
//! # Machine-readable summary
//! datesort ~/inbox -o ~/sorted --yes --json
//! ```

use crate::config::{Config, ConfigError};
use crate::context::{BucketDepth, ConflictMode, DateSource, OrganizeContext};
use crate::error::OrganizeError;
use crate::organizer::{OrganizeSummary, Organizer, PreparedRun};
use crate::output::OutputFormatter;
use crate::planner::FileOrganizeResult;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// datesort - move files into date-named directories
#[derive(Parser, Debug)]
#[command(name = "datesort")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory whose files should be organized
    pub source: PathBuf,

    /// Root of the date tree (falls back to `output` in the config file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Which timestamp decides the bucket
    #[arg(long, value_enum)]
    pub date_source: Option<DateSourceArg>,

    /// Bucket nesting: 1 = YYYYMMDD, 2 = YYYY/YYYYMMDD, 3 = YYYY/YYYYMM/YYYYMMDD
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub depth: Option<u8>,

    /// What to do when a target name is already taken
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictArg>,

    /// Include hidden files and directories
    #[arg(long)]
    pub hidden: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Follow symbolic links to directories while scanning
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Show what would happen without touching the filesystem
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Remove directories left empty in the source afterwards
    #[arg(long)]
    pub clean_empty: bool,

    /// Abort on the first file that cannot be dated or moved
    #[arg(long)]
    pub fail_fast: bool,

    /// Do not ask for confirmation before moving
    #[arg(short, long)]
    pub yes: bool,

    /// Configuration file to use instead of the discovered one
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the summary and plan as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DateSourceArg {
    /// Birth time, falling back to modification time
    Created,
    /// Last modification time
    Modified,
}

impl From<DateSourceArg> for DateSource {
    fn from(arg: DateSourceArg) -> Self {
        match arg {
            DateSourceArg::Created => DateSource::Created,
            DateSourceArg::Modified => DateSource::Modified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictArg {
    /// Append _1, _2, ... before the extension (default)
    Rename,
    /// Leave the source where it is
    Skip,
    /// Replace the existing target
    Overwrite,
    /// Like rename within a run; files already on disk are skipped, never prompted for
    Ask,
}

impl From<ConflictArg> for ConflictMode {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Rename => ConflictMode::Rename,
            ConflictArg::Skip => ConflictMode::Skip,
            ConflictArg::Overwrite => ConflictMode::Overwrite,
            ConflictArg::Ask => ConflictMode::Ask,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    source: &'a Path,
    output: &'a Path,
    summary: &'a OrganizeSummary,
    plan: &'a [FileOrganizeResult],
}

/// Merges command-line flags over configuration defaults.
///
/// Flags always win. Boolean flags can only switch an option on, so a
/// `true` in the configuration file cannot be turned off from the command line.
///
/// # Errors
///
/// Returns [`ConfigError::MissingOutput`] when neither the flags nor the
/// configuration name an output directory.
pub fn build_context(cli: &Cli, config: &Config) -> Result<OrganizeContext, ConfigError> {
    let defaults = &config.organize;
    let output = cli
        .output
        .clone()
        .or_else(|| defaults.output.clone())
        .ok_or(ConfigError::MissingOutput)?;

    let depth = match cli.depth {
        Some(depth) => BucketDepth::try_from(depth).map_err(|reason| ConfigError::Invalid {
            path: PathBuf::from("--depth"),
            reason,
        })?,
        None => defaults.depth.unwrap_or_default(),
    };

    let mut ctx = OrganizeContext::new(output);
    ctx.date_source = cli
        .date_source
        .map(DateSource::from)
        .or(defaults.date_source)
        .unwrap_or_default();
    ctx.depth = depth;
    ctx.conflict_mode = cli
        .on_conflict
        .map(ConflictMode::from)
        .or(defaults.on_conflict)
        .unwrap_or_default();
    ctx.dry_run = cli.dry_run;
    ctx.include_hidden = cli.hidden || defaults.include_hidden.unwrap_or(false);
    ctx.recursive = cli.recursive || defaults.recursive.unwrap_or(false);
    ctx.follow_symlinks = cli.follow_symlinks || defaults.follow_symlinks.unwrap_or(false);
    ctx.clean_empty = cli.clean_empty || defaults.clean_empty.unwrap_or(false);
    ctx.fail_fast = cli.fail_fast || defaults.fail_fast.unwrap_or(false);
    Ok(ctx)
}

/// Reads one answer line; anything but `y`/`yes` declines.
fn confirm<R: BufRead>(mut input: R) -> bool {
    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Runs one organize invocation described by `cli`.
///
/// # Errors
///
/// Configuration problems and aborted runs are returned; per-file failures
/// are counted in the printed summary instead.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use datesort::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["datesort", "/tmp/inbox", "--output", "/tmp/sorted", "--dry-run"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<(), OrganizeError> {
    let config = Config::load(cli.config.as_deref())?;
    let filters = config.filters.compile()?;
    let ctx = build_context(&cli, &config)?;

    if !cli.json {
        OutputFormatter::info(&format!(
            "Organizing {} into {}",
            cli.source.display(),
            ctx.output_dir.display()
        ));
        if ctx.conflict_mode == ConflictMode::Ask {
            OutputFormatter::warning(
                "--on-conflict ask does not prompt; files whose target already exists will be skipped",
            );
        }
    }

    let mut organizer = Organizer::with_filters(ctx, filters);
    let prepared = organizer.prepare(&cli.source)?;
    let dry_run = organizer.context().dry_run;

    if !cli.json && (dry_run || cli.verbose) {
        print_plan(&prepared);
    }

    if !dry_run && prepared.pending_moves() > 0 && !cli.yes {
        eprint!("Move {} file(s)? [y/N] ", prepared.pending_moves());
        io::stderr().flush().ok();
        if !confirm(io::stdin().lock()) {
            OutputFormatter::warning("Aborted; nothing was moved.");
            return Ok(());
        }
    }

    let summary = if dry_run || cli.json {
        organizer.execute(&prepared, |_, _, _| {})?
    } else {
        let pb = OutputFormatter::create_progress_bar(prepared.pending_moves() as u64);
        let summary = organizer.execute(&prepared, |done, _, source| {
            pb.set_position(done as u64);
            pb.set_message(
                source
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        });
        pb.finish_and_clear();
        summary?
    };

    if cli.json {
        let report = JsonReport {
            source: &prepared.source_root,
            output: &organizer.context().output_dir,
            summary: &summary,
            plan: &prepared.plan,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => OutputFormatter::error(&format!("Could not serialize report: {}", e)),
        }
        return Ok(());
    }

    OutputFormatter::summary_table(&summary);
    if dry_run {
        OutputFormatter::dry_run_notice("No files were modified.");
    } else if summary.errors > 0 {
        OutputFormatter::warning("Some files could not be organized. Run with -v for details.");
    } else {
        OutputFormatter::success("Organization complete");
    }
    Ok(())
}

fn print_plan(prepared: &PreparedRun) {
    if prepared.plan.is_empty() {
        OutputFormatter::info("No files found to organize.");
        return;
    }
    OutputFormatter::header("PLAN");
    for entry in &prepared.plan {
        OutputFormatter::plan_entry(entry, &prepared.source_root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("datesort").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&["src", "-o", "/flag", "--depth", "1", "--on-conflict", "overwrite"]);
        let config = Config::parse(
            r#"
            [organize]
            output = "/config"
            depth = 2
            on_conflict = "skip"
            date_source = "modified"
            "#,
        )
        .unwrap();

        let ctx = build_context(&cli, &config).unwrap();

        assert_eq!(ctx.output_dir, PathBuf::from("/flag"));
        assert_eq!(ctx.depth, BucketDepth::Day);
        assert_eq!(ctx.conflict_mode, ConflictMode::Overwrite);
        assert_eq!(ctx.date_source, DateSource::Modified);
    }

    #[test]
    fn test_config_supplies_output_and_switches() {
        let cli = parse(&["src"]);
        let config = Config::parse(
            r#"
            [organize]
            output = "/sorted"
            recursive = true
            clean_empty = true
            "#,
        )
        .unwrap();

        let ctx = build_context(&cli, &config).unwrap();

        assert_eq!(ctx.output_dir, PathBuf::from("/sorted"));
        assert!(ctx.recursive);
        assert!(ctx.clean_empty);
        assert!(!ctx.include_hidden);
        assert_eq!(ctx.depth, BucketDepth::YearMonthDay);
        assert_eq!(ctx.conflict_mode, ConflictMode::Rename);
    }

    #[test]
    fn test_missing_output_is_error() {
        let cli = parse(&["src"]);
        let result = build_context(&cli, &Config::default());
        assert!(matches!(result, Err(ConfigError::MissingOutput)));
    }

    #[test]
    fn test_depth_out_of_range_rejected_by_parser() {
        let result = Cli::try_parse_from(["datesort", "src", "-o", "out", "--depth", "4"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_value_enums_map_to_engine_types() {
        assert_eq!(DateSource::from(DateSourceArg::Modified), DateSource::Modified);
        assert_eq!(ConflictMode::from(ConflictArg::Ask), ConflictMode::Ask);
        assert_eq!(ConflictMode::from(ConflictArg::Rename), ConflictMode::Rename);
    }

    #[test]
    fn test_confirm_answers() {
        assert!(confirm("y\n".as_bytes()));
        assert!(confirm("YES\n".as_bytes()));
        assert!(!confirm("n\n".as_bytes()));
        assert!(!confirm("".as_bytes()));
    }
}
