//! Picks the timestamp a file is bucketed by.

use crate::context::DateSource;
use crate::error::DateReadError;
use chrono::{DateTime, Local};
use std::fs::{self, Metadata};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamps read from one `stat` call.
///
/// `changed` is the inode-change time. It is carried so that callers can log
/// it, but it is never a valid bucketing date: metadata edits (chmod, rename,
/// hard links) bump it without the content changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimestamps {
    pub born: Option<SystemTime>,
    pub modified: SystemTime,
    pub changed: Option<SystemTime>,
}

impl FileTimestamps {
    /// Collects the timestamps exposed by `metadata`.
    pub fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
        Ok(Self {
            born: metadata.created().ok(),
            modified: metadata.modified()?,
            changed: change_time(metadata),
        })
    }

    /// Selects the timestamp for `source`.
    pub fn pick(&self, source: DateSource) -> SystemTime {
        match source {
            DateSource::Modified => self.modified,
            DateSource::Created => self
                .born
                .filter(|born| is_valid_timestamp(*born))
                .unwrap_or(self.modified),
        }
    }
}

/// Birth times of zero (or before the epoch) are placeholders some filesystems report.
fn is_valid_timestamp(time: SystemTime) -> bool {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| !elapsed.is_zero())
        .unwrap_or(false)
}

#[cfg(unix)]
fn change_time(metadata: &Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::Duration;

    let secs = u64::try_from(metadata.ctime()).ok()?;
    let nanos = u32::try_from(metadata.ctime_nsec()).ok()?;
    UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn change_time(_metadata: &Metadata) -> Option<SystemTime> {
    None
}

/// Resolves the bucketing date of `path` in local time.
///
/// Symlinks are followed, so a linked file is dated by its target.
pub fn resolve_date(path: &Path, source: DateSource) -> Result<DateTime<Local>, DateReadError> {
    let timestamps = fs::metadata(path)
        .and_then(|metadata| FileTimestamps::from_metadata(&metadata))
        .map_err(|e| DateReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

    let picked = timestamps.pick(source);
    tracing::trace!(
        path = %path.display(),
        ?source,
        changed = ?timestamps.changed,
        "resolved file date"
    );
    Ok(DateTime::<Local>::from(picked))
}
