//! Error types for the organize engine.
//!
//! `DateReadError` and `MoveError` are the per-file failures; both convert
//! into the umbrella `OrganizeError` so callers running with fail-fast can
//! bubble them up with `?`.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// A usable timestamp could not be read for a file.
#[derive(Error, Debug)]
#[error("Failed to read date of {path}: {source}")]
pub struct DateReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Errors raised while executing a single planned move.
#[derive(Error, Debug)]
pub enum MoveError {
    #[error("Source {path} is outside the source root {root}")]
    OutsideSourceRoot { path: PathBuf, root: PathBuf },

    #[error("Target {path} is outside the output root {root}")]
    OutsideOutputRoot { path: PathBuf, root: PathBuf },

    #[error("Target {path} contains a parent-directory component")]
    PathTraversal { path: PathBuf },

    #[error("Failed to resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy of {from} to {to} is incomplete: {expected} bytes expected, {actual} written")]
    CopyVerification {
        from: PathBuf,
        to: PathBuf,
        expected: u64,
        actual: u64,
    },
}

/// Top-level error for an organize run.
#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error("Source directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Date(#[from] DateReadError),

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error("Failed to clean up {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, OrganizeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn date_error_names_the_file() {
        let error = DateReadError {
            path: PathBuf::from("/photos/gone.jpg"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/gone.jpg"));
        assert!(message.contains("no such file"));
    }

    #[test]
    fn move_error_converts_to_organize_error() {
        let error: OrganizeError = MoveError::OutsideOutputRoot {
            path: PathBuf::from("/etc/passwd"),
            root: PathBuf::from("/out"),
        }
        .into();
        assert!(matches!(error, OrganizeError::Move(_)));
        assert!(error.to_string().contains("/etc/passwd"));
    }

    #[test]
    fn copy_verification_reports_sizes() {
        let error = MoveError::CopyVerification {
            from: PathBuf::from("a"),
            to: PathBuf::from("b"),
            expected: 10,
            actual: 4,
        };
        let message = error.to_string();
        assert!(message.contains("10 bytes expected"));
        assert!(message.contains("4 written"));
    }
}
