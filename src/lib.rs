//! datesort - organize files into date-based directory trees
//!
//! This library scans a source directory, buckets every file by its
//! creation or modification date, resolves name collisions within a run and
//! against files already on disk, and moves the files into an output tree
//! without ever writing outside it. Runs can be simulated with a dry run.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod context;
pub mod date_resolver;
pub mod error;
pub mod mover;
pub mod organizer;
pub mod output;
pub mod path_utils;
pub mod planner;
pub mod scanner;

pub use config::{CompiledFilters, Config, ConfigError};
pub use context::{BucketDepth, ConflictMode, DateSource, OrganizeContext};
pub use error::{DateReadError, MoveError, OrganizeError, Result};
pub use organizer::{OrganizeSummary, Organizer, Phase, PreparedRun};
pub use planner::{Action, FileOrganizeResult, SkipReason};

pub use cli::{Cli, run_cli};

/// Initialize tracing for the binary.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` selects `debug` over `warn`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
