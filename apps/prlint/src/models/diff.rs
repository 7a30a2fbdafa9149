//! Diff records and the filter that decides which changed files are reported.

use glob::Pattern;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
/// How a file changed between base and head.
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    PermissionChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One file's changes between two revisions, keyed by its head path.
pub struct DiffRecord {
    pub path: String,
    /// Path at base when the file was renamed.
    pub old_path: Option<String>,
    pub status: FileStatus,
    /// Head-side line numbers added or rewritten by the diff.
    pub changed_lines: BTreeSet<usize>,
    pub patch: Option<String>,
}

impl DiffRecord {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            status,
            changed_lines: BTreeSet::new(),
            patch: None,
        }
    }

    /// A touched file with nothing to review: approve it rather than report "no issues".
    pub fn is_auto_approvable(&self) -> bool {
        self.changed_lines.is_empty() && self.status != FileStatus::Removed
    }
}

/// All files changed by a pull request, ordered by head path.
pub type DiffSet = BTreeMap<String, DiffRecord>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Which changed files the diff provider reports.
pub struct DiffFilter {
    /// Extensions without the leading dot; empty admits every file.
    pub file_extensions: BTreeSet<String>,
    /// Folder prefixes or glob patterns, relative to the repository root.
    pub skip_folders: BTreeSet<String>,
    pub include_renamed: bool,
    pub include_removed: bool,
    pub include_permission_changes: bool,
}

impl DiffFilter {
    /// Whether `path` passes the extension and folder filters.
    pub fn admits(&self, path: &str) -> bool {
        if !self.file_extensions.is_empty() {
            let ext = std::path::Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            match ext {
                Some(e) if self.file_extensions.contains(&e) => {}
                _ => return false,
            }
        }
        !self.skip_folders.iter().any(|f| folder_matches(f, path))
    }

    /// Stable textual identity for cache keys.
    pub fn fingerprint(&self) -> String {
        format!(
            "ext={:?};skip={:?};renamed={};removed={};perm={}",
            self.file_extensions,
            self.skip_folders,
            self.include_renamed,
            self.include_removed,
            self.include_permission_changes
        )
    }
}

fn folder_matches(folder: &str, path: &str) -> bool {
    let folder = folder.trim_start_matches("./");
    if folder.contains(['*', '?', '[']) {
        return Pattern::new(folder)
            .map(|p| p.matches(path))
            .unwrap_or(false);
    }
    let prefix = folder.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    path == prefix || path.starts_with(&format!("{}/", prefix))
}
