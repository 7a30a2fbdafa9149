//! Shared data models for scanner findings, attributed issues, and reports.

pub mod diff;
pub mod revision;

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
/// Severity reported by a scanner.
pub enum Severity {
    Error,
    #[default]
    Warning,
    Info,
}

impl Severity {
    /// Map a scanner's severity label; unknown labels fold into `Warning`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "error" | "err" | "fatal" | "critical" | "high" => Severity::Error,
            "info" | "note" | "notice" | "low" => Severity::Info,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A scanner finding on an absolute line of a file.
pub struct RawIssue {
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub rule: String,
    pub message: String,
    /// Tag of the scanner that produced the finding (e.g. `lint`).
    pub tool: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A finding accepted for a pull request, anchored to its diff-relative position.
pub struct AttributedIssue {
    pub file: String,
    /// 1-based ordinal of the issue's line within the file's changed-line set.
    pub position: usize,
    #[serde(flatten)]
    pub issue: RawIssue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A file the run could not attribute, with the reason it was passed over.
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Outcome of reviewing one pull request.
pub struct ReviewReport {
    pub number: Option<u64>,
    pub base: String,
    pub head: String,
    pub comments: Vec<AttributedIssue>,
    pub skipped: Vec<SkippedFile>,
    /// Files touched by the pull request with no changed lines (renames, mode changes).
    pub auto_approvable: Vec<String>,
}

impl ReviewReport {
    pub fn errors(&self) -> usize {
        self.comments
            .iter()
            .filter(|c| c.issue.severity == Severity::Error)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Everything a run produced, ready for the printers.
pub struct RunReport {
    pub pull_requests: Vec<ReviewReport>,
    pub tools: std::collections::BTreeMap<String, String>,
    pub alerts: Vec<String>,
    pub counters: std::collections::BTreeMap<String, u64>,
}
