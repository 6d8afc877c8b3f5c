//! The result log files: a header line followed by the
//! semicolon-separated metric values, possibly wrapped over multiple
//! lines.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use kstring::KString;

use crate::metric_table::MetricIndexTable;

pub const FIELD_SEPARATOR: char = ';';

/// The single-line form of a log file's contents: without the header
/// line, the remaining lines trimmed and joined with
/// `FIELD_SEPARATOR`. None if the contents consist of at most one
/// line (which are then taken as already converted).
pub fn single_line_contents(contents: &str) -> Option<String> {
    let lines: Vec<&str> = contents.lines().map(str::trim).collect();
    if lines.len() > 1 {
        Some(lines[1..].join(";"))
    } else {
        None
    }
}

/// The record line of a log file's contents, converted or not. None
/// for empty contents.
pub fn record_line(contents: &str) -> Option<String> {
    single_line_contents(contents)
        .or_else(|| contents.lines().next().map(|line| line.trim().to_string()))
}

/// Rewrite the log file at `path` in single-line form, if it isn't
/// already. Returns whether the file was rewritten.
pub fn convert_to_single_line(path: &Path) -> Result<bool> {
    let contents =
        std::fs::read_to_string(path).with_context(|| anyhow!("reading log file {path:?}"))?;
    if let Some(line) = single_line_contents(&contents) {
        std::fs::write(path, line).with_context(|| anyhow!("rewriting log file {path:?}"))?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// The record line of a log file that was converted with
/// `convert_to_single_line`: the first line, trimmed. None for empty
/// files.
pub fn read_record_line(path: &Path) -> Result<Option<String>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| anyhow!("reading log file {path:?}"))?;
    Ok(contents.lines().next().map(|line| line.trim().to_string()))
}

/// One value per table position, in table order. Fields beyond the
/// table are dropped, missing trailing fields are `None`.
pub fn parse_record_line(line: &str, table: &MetricIndexTable) -> Vec<Option<KString>> {
    let mut fields = line.split(FIELD_SEPARATOR);
    (0..table.len())
        .map(|_| fields.next().map(KString::from_ref))
        .collect()
}

/// Like `parse_record_line`, paired with the metric names.
pub fn named_fields<'t>(
    line: &str,
    table: &'t MetricIndexTable,
) -> impl Iterator<Item = (&'t str, Option<KString>)> {
    table.names().zip(parse_record_line(line, table))
}
