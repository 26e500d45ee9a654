//! Pure helpers for file names and target layout.

use crate::context::BucketDepth;
use chrono::{DateTime, Datelike, TimeZone};
use glob::Pattern;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Suffixes that wrap another format and therefore belong to a compound extension.
const COMPRESSION_EXTENSIONS: &[&str] = &[
    "gz", "bz2", "xz", "zst", "lz", "lzma", "lz4", "z", "br", "sz",
];

/// Longest inner extension still treated as part of a compound one (`tar`, `json`).
const MAX_INNER_EXTENSION_LEN: usize = 4;

/// Splits a file name into stem and extension, keeping compound extensions whole.
///
/// The returned extension includes its leading dot, or is empty.
///
/// ```
/// use datesort::path_utils::split_extension;
///
/// assert_eq!(split_extension("archive.tar.gz"), ("archive", ".tar.gz"));
/// assert_eq!(split_extension("photo.jpg"), ("photo", ".jpg"));
/// assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
/// ```
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match extension_start(file_name.as_bytes()) {
        // The split index is always an ASCII dot, so it is a char boundary.
        Some(idx) => file_name.split_at(idx),
        None => (file_name, ""),
    }
}

/// Index of the dot that starts the (possibly compound) extension.
///
/// Works on raw bytes so non-UTF-8 names split the same way.
fn extension_start(name: &[u8]) -> Option<usize> {
    let last_dot = last_extension_dot(name)?;
    let (head, last_ext) = (&name[..last_dot], &name[last_dot + 1..]);

    let compressed = COMPRESSION_EXTENSIONS
        .iter()
        .any(|ext| last_ext.eq_ignore_ascii_case(ext.as_bytes()));
    if compressed && let Some(inner_dot) = last_extension_dot(head) {
        let inner = &head[inner_dot + 1..];
        if inner.len() <= MAX_INNER_EXTENSION_LEN && inner.iter().all(u8::is_ascii_alphanumeric) {
            return Some(inner_dot);
        }
    }
    Some(last_dot)
}

/// Position of the dot starting the last extension, ignoring a leading dot.
fn last_extension_dot(name: &[u8]) -> Option<usize> {
    match name.iter().rposition(|&b| b == b'.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 == name.len() => None,
        Some(idx) => Some(idx),
    }
}

/// Returns `path` with `_n` inserted before its extension.
///
/// The original bytes of the file name are kept, even when they are not UTF-8.
pub fn with_suffix(path: &Path, n: usize) -> PathBuf {
    let file_name = path.file_name().unwrap_or_default();
    let bytes = file_name.as_encoded_bytes();
    let split = extension_start(bytes).unwrap_or(bytes.len());
    let (stem, ext) = bytes.split_at(split);

    // SAFETY: both halves come from a valid encoded OsStr split right before
    // an ASCII dot (or at its end), which `from_encoded_bytes_unchecked` allows.
    let (stem, ext) = unsafe {
        (
            OsStr::from_encoded_bytes_unchecked(stem),
            OsStr::from_encoded_bytes_unchecked(ext),
        )
    };

    let mut renamed = OsString::with_capacity(bytes.len() + 8);
    renamed.push(stem);
    renamed.push(format!("_{}", n));
    renamed.push(ext);
    path.with_file_name(renamed)
}

/// Relative bucket directory for a date at the given depth.
pub fn bucket_dir<Tz: TimeZone>(date: &DateTime<Tz>, depth: BucketDepth) -> PathBuf {
    let year = format!("{:04}", date.year());
    let month = format!("{}{:02}", year, date.month());
    let day = format!("{}{:02}", month, date.day());

    match depth {
        BucketDepth::YearMonthDay => [year, month, day].iter().collect(),
        BucketDepth::YearDay => [year, day].iter().collect(),
        BucketDepth::Day => PathBuf::from(day),
    }
}

/// Full destination of `file_name` under `output_dir`.
pub fn target_path<Tz: TimeZone>(
    output_dir: &Path,
    date: &DateTime<Tz>,
    depth: BucketDepth,
    file_name: &OsStr,
) -> PathBuf {
    output_dir.join(bucket_dir(date, depth)).join(file_name)
}

/// Dotfiles and dot-directories.
pub fn is_hidden(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') && name != "." && name != ".."
}

/// True when `path` matches any of the compiled glob `patterns`.
pub fn matches_any_glob(patterns: &[Pattern], path: &Path) -> bool {
    patterns.iter().any(|pattern| pattern.matches_path(path))
}
