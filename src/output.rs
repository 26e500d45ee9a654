//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and the run summary. The engine itself never prints.

use crate::organizer::OrganizeSummary;
use crate::planner::{Action, FileOrganizeResult, SkipReason};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use datesort::output::OutputFormatter;
    /// OutputFormatter::success("Organization complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for the moving phase.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// One line per plan entry, paths shown relative to `source_root` where possible.
    pub fn plan_entry(entry: &FileOrganizeResult, source_root: &Path) {
        let source = entry
            .source
            .strip_prefix(source_root)
            .unwrap_or(&entry.source)
            .display();
        match &entry.action {
            Action::Moved => println!(" - {} {} {}", source, "→".cyan(), entry.target.display()),
            Action::Skipped(reason) => {
                let reason = match reason {
                    SkipReason::AlreadyInPlace => "already in place",
                    SkipReason::Collision => "name taken by another file in this run",
                };
                println!(" - {} {}", source, format!("(skipped: {})", reason).yellow());
            }
            Action::Error(message) => {
                println!(" - {} {}", source, format!("(error: {})", message).red())
            }
        }
    }

    /// Prints the run summary as a two-column table.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use datesort::output::OutputFormatter;
    /// use datesort::OrganizeSummary;
    ///
    /// OutputFormatter::summary_table(&OrganizeSummary::default());
    /// ```
    pub fn summary_table(summary: &OrganizeSummary) {
        Self::header(if summary.dry_run {
            "SUMMARY (dry run)"
        } else {
            "SUMMARY"
        });

        let processed_label = if summary.dry_run {
            "Would move"
        } else {
            "Moved"
        };
        let rows = [
            ("Files scanned", summary.total_files.to_string().normal()),
            (processed_label, summary.processed.to_string().green()),
            ("Skipped", summary.skipped.to_string().yellow()),
            (
                "Errors",
                if summary.errors > 0 {
                    summary.errors.to_string().red()
                } else {
                    summary.errors.to_string().normal()
                },
            ),
            (
                "Directories created",
                summary.directories_created.to_string().normal(),
            ),
        ];

        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        println!("{}", "-".repeat(width + 10));
        for (label, value) in rows {
            println!("{:<width$} | {}", label, value, width = width);
        }
        println!("{}", "-".repeat(width + 10));
    }
}
