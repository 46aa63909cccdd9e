//! CLI output formatting for export results.
//!
//! # Output Format
//!
//! One block per export, files indented under their export with sizes,
//! followed by a totals line:
//!
//! ```text
//! PNG sheet (16 frames)
//!     out/knight.png  4.2 KB
//! Mobile bundle (16 frames)
//!     out/mobile/android/res/drawable-mdpi/character_knight.png  4.2 KB
//!     out/mobile/ios/Assets.xcassets/character_knight.imageset/Contents.json  312 B
//! Aseprite manifest
//!     out/knight.json  3.1 KB
//!
//! Exported 3 assets (3 files, 11.8 KB)
//! ```
//!
//! Paths are shown relative to the output root when they live under it.
//!
//! # Architecture
//!
//! Each block has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::export::{ExportReport, WrittenFile};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with one decimal above 1 KB.
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// `path` relative to `root` when it lies under it.
fn display_path(path: &Path, root: Option<&Path>) -> String {
    root.and_then(|r| path.strip_prefix(r).ok())
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

fn file_line(file: &WrittenFile, root: Option<&Path>) -> String {
    format!(
        "{}{}  {}",
        indent(1),
        display_path(&file.path, root),
        format_bytes(file.bytes)
    )
}

// ============================================================================
// Export reports
// ============================================================================

/// Format one export: header with the frame count, then its files.
pub fn format_export_report(report: &ExportReport, root: Option<&Path>) -> Vec<String> {
    let header = if report.frames > 0 {
        format!("{} ({})", report.kind, plural(report.frames as usize, "frame"))
    } else {
        report.kind.to_string()
    };
    std::iter::once(header)
        .chain(report.files.iter().map(|f| file_line(f, root)))
        .collect()
}

pub fn print_export_report(report: &ExportReport, root: Option<&Path>) {
    for line in format_export_report(report, root) {
        println!("{}", line);
    }
}

/// Format every report followed by a blank line and the totals.
pub fn format_export_summary(reports: &[ExportReport], root: Option<&Path>) -> Vec<String> {
    let mut lines: Vec<String> = reports
        .iter()
        .flat_map(|r| format_export_report(r, root))
        .collect();
    let files: usize = reports.iter().map(|r| r.files.len()).sum();
    let bytes: u64 = reports.iter().map(ExportReport::total_bytes).sum();
    lines.push(String::new());
    lines.push(format!(
        "Exported {} ({}, {})",
        plural(reports.len(), "asset"),
        plural(files, "file"),
        format_bytes(bytes)
    ));
    lines
}

pub fn print_export_summary(reports: &[ExportReport], root: Option<&Path>) {
    for line in format_export_summary(reports, root) {
        println!("{}", line);
    }
}
