//! prlint core library.
//!
//! Reviews pull requests incrementally: external scanners run over the files
//! a pull request touches, and only the issues that sit on lines the pull
//! request both changed and authored are reported.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `context`: Run-scoped cache, counters, alerts, and process runner.
//! - `git`: Verified repository handle, diff provider, and blame provider.
//! - `scanner`: Lint and audit scanner dispatch and finding parsing.
//! - `attribution`: Two-gate filter from raw findings to attributed issues.
//! - `dedup`: Collapse of identical findings within one file.
//! - `review`: Per pull request pipeline tying the above together.
//! - `process`: External command execution with retries.
//! - `cache`, `counters`, `alerts`: Memoization, run metrics, alert collapsing.
//! - `models`: Diff, revision, issue, and report data types.
//! - `output`: Human/JSON printers for review runs.
//! - `utils`: Supporting helpers.
pub mod alerts;
pub mod attribution;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod counters;
pub mod dedup;
pub mod error;
pub mod git;
pub mod models;
pub mod output;
pub mod process;
pub mod review;
pub mod scanner;
pub mod utils;
