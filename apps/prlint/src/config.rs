//! Configuration discovery and effective settings resolution.
//!
//! prlint reads `prlint.toml|yaml|yml` from the repository root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `output`: `human`
//! - `filter`: every extension, no skipped folders, renames flagged without
//!   content, removals and permission-only changes left out
//! - `process.retries`: 3, `process.backoff_ms`: 500
//! - no scanners
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::FatalError;
use crate::models::diff::DiffFilter;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILES: [&str; 3] = ["prlint.toml", "prlint.yaml", "prlint.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// `[filter]`: which changed files are reviewed.
pub struct FilterCfg {
    pub extensions: Option<Vec<String>>,
    pub skip_folders: Option<Vec<String>>,
    pub include_renamed: Option<bool>,
    pub include_removed: Option<bool>,
    pub include_permission_changes: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// `[process]`: retry budget for external commands.
pub struct ProcessCfg {
    pub retries: Option<u32>,
    pub backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone, PartialEq, Eq)]
/// `[scanners.<kind>]`: how to invoke one external scanner.
pub struct ScannerCfg {
    /// argv; `{file}` is replaced by the absolute path, otherwise content goes to stdin.
    pub command: Vec<String>,
    /// Lint: extensions without the dot.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Audit: manifest basenames such as `requirements.txt`.
    #[serde(default)]
    pub files: Vec<String>,
    pub allowed_exit_codes: Option<Vec<i32>>,
    pub version_command: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ScannersCfg {
    pub lint: Option<ScannerCfg>,
    pub audit: Option<ScannerCfg>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `prlint.toml|yaml`.
pub struct PrlintConfig {
    pub output: Option<String>,
    pub filter: Option<FilterCfg>,
    pub process: Option<ProcessCfg>,
    pub scanners: Option<ScannersCfg>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub config_path: Option<PathBuf>,
    pub output: String,
    pub filter: DiffFilter,
    pub retries: u32,
    pub backoff: Duration,
    pub lint: Option<ScannerCfg>,
    pub audit: Option<ScannerCfg>,
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `prlint.toml|yaml|yml` or a `.git` entry is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_FILES.iter().any(|f| cur.join(f).exists()) || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Find the config file under `root`, if any.
pub fn find_config(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|f| root.join(f))
        .find(|p| p.is_file())
}

/// Load `PrlintConfig` from `path`. A file that exists but does not parse is fatal.
pub fn load_config(path: &Path) -> Result<PrlintConfig, FatalError> {
    let s = fs::read_to_string(path)
        .map_err(|e| FatalError::Config(format!("{}: {}", path.display(), e)))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&s)
            .map_err(|e| FatalError::Config(format!("{}: {}", path.display(), e)))
    } else {
        toml::from_str(&s).map_err(|e| FatalError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(
    cli_repo_root: Option<&str>,
    cli_config: Option<&str>,
    cli_output: Option<&str>,
) -> Result<Effective, FatalError> {
    let start = PathBuf::from(cli_repo_root.unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let config_path = match cli_config {
        Some(p) => {
            let p = PathBuf::from(p);
            if !p.is_file() {
                return Err(FatalError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            Some(p)
        }
        None => find_config(&repo_root),
    };
    let cfg = match config_path.as_deref() {
        Some(p) => load_config(p)?,
        None => PrlintConfig::default(),
    };

    let output = cli_output
        .map(|s| s.to_string())
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    if output != "human" && output != "json" {
        return Err(FatalError::Config(format!(
            "unknown output mode '{}' (expected human|json)",
            output
        )));
    }

    let f = cfg.filter.unwrap_or_default();
    let filter = DiffFilter {
        file_extensions: f
            .extensions
            .unwrap_or_default()
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect(),
        skip_folders: f
            .skip_folders
            .unwrap_or_default()
            .iter()
            .map(|s| relative_folder(&repo_root, s))
            .collect(),
        include_renamed: f.include_renamed.unwrap_or(false),
        include_removed: f.include_removed.unwrap_or(false),
        include_permission_changes: f.include_permission_changes.unwrap_or(false),
    };

    let process = cfg.process.unwrap_or_default();
    let scanners = cfg.scanners.unwrap_or_default();
    for (kind, sc) in [("lint", &scanners.lint), ("audit", &scanners.audit)] {
        if let Some(sc) = sc {
            if sc.command.is_empty() {
                return Err(FatalError::Config(format!(
                    "[scanners.{}].command must not be empty",
                    kind
                )));
            }
        }
    }

    Ok(Effective {
        repo_root,
        config_path,
        output,
        filter,
        retries: process.retries.unwrap_or(3),
        backoff: Duration::from_millis(process.backoff_ms.unwrap_or(500)),
        lint: scanners.lint,
        audit: scanners.audit,
    })
}

/// Make an absolute folder repository-relative; relative entries pass through.
fn relative_folder(root: &Path, folder: &str) -> String {
    let p = Path::new(folder);
    if p.is_absolute() {
        if let Some(rel) = pathdiff::diff_paths(p, root) {
            return rel.to_string_lossy().to_string();
        }
    }
    folder.to_string()
}
