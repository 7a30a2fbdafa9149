//! Scanner dispatch.
//!
//! Scanners are external commands that print a JSON array of
//! `{line, column, severity, rule, message}`. Which scanner handles a file is
//! decided by a closed set of kinds: `Lint` by extension, `Audit` by manifest
//! name. Tool-specific formats are adapted outside prlint.

use crate::cache::{CacheKey, CacheOp, CacheValue};
use crate::config::{Effective, ScannerCfg};
use crate::context::RunContext;
use crate::error::Unavailable;
use crate::git::Repository;
use crate::models::{RawIssue, Severity};
use crate::process::CommandSpec;
use log::warn;
use serde::Deserialize;
use std::path::Path;

const FILE_PLACEHOLDER: &str = "{file}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScannerKind {
    Lint,
    Audit,
}

impl ScannerKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ScannerKind::Lint => "lint",
            ScannerKind::Audit => "audit",
        }
    }

    /// Severity assumed when the tool does not report one.
    fn default_severity(&self) -> Severity {
        match self {
            ScannerKind::Lint => Severity::Warning,
            // An advisory hit without a level is still a vulnerability.
            ScannerKind::Audit => Severity::Error,
        }
    }
}

/// Produce findings for one file of the verified checkout.
pub trait Scan {
    fn scan(
        &self,
        ctx: &mut RunContext,
        repo: &Repository,
        path: &str,
    ) -> Result<Vec<RawIssue>, Unavailable>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintScanner {
    cfg: ScannerCfg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditScanner {
    cfg: ScannerCfg,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scanner {
    Lint(LintScanner),
    Audit(AuditScanner),
}

impl LintScanner {
    pub fn new(cfg: ScannerCfg) -> Self {
        Self { cfg }
    }

    fn handles(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                self.cfg
                    .extensions
                    .iter()
                    .any(|x| x.trim_start_matches('.').eq_ignore_ascii_case(e))
            })
            .unwrap_or(false)
    }
}

impl AuditScanner {
    pub fn new(cfg: ScannerCfg) -> Self {
        Self { cfg }
    }

    fn handles(&self, path: &str) -> bool {
        Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| self.cfg.files.iter().any(|f| f == n))
            .unwrap_or(false)
    }
}

impl Scan for LintScanner {
    fn scan(
        &self,
        ctx: &mut RunContext,
        repo: &Repository,
        path: &str,
    ) -> Result<Vec<RawIssue>, Unavailable> {
        run_scanner(ctx, repo, path, ScannerKind::Lint, &self.cfg)
    }
}

impl Scan for AuditScanner {
    fn scan(
        &self,
        ctx: &mut RunContext,
        repo: &Repository,
        path: &str,
    ) -> Result<Vec<RawIssue>, Unavailable> {
        run_scanner(ctx, repo, path, ScannerKind::Audit, &self.cfg)
    }
}

impl Scan for Scanner {
    fn scan(
        &self,
        ctx: &mut RunContext,
        repo: &Repository,
        path: &str,
    ) -> Result<Vec<RawIssue>, Unavailable> {
        match self {
            Scanner::Lint(s) => s.scan(ctx, repo, path),
            Scanner::Audit(s) => s.scan(ctx, repo, path),
        }
    }
}

impl Scanner {
    pub fn kind(&self) -> ScannerKind {
        match self {
            Scanner::Lint(_) => ScannerKind::Lint,
            Scanner::Audit(_) => ScannerKind::Audit,
        }
    }

    fn cfg(&self) -> &ScannerCfg {
        match self {
            Scanner::Lint(s) => &s.cfg,
            Scanner::Audit(s) => &s.cfg,
        }
    }

    fn handles(&self, path: &str) -> bool {
        match self {
            Scanner::Lint(s) => s.handles(path),
            Scanner::Audit(s) => s.handles(path),
        }
    }

    /// Tool version from `version_command`, queried once per run.
    pub fn version(&self, ctx: &mut RunContext) -> Option<String> {
        let argv = self.cfg().version_command.as_ref()?;
        let (program, args) = argv.split_first()?;
        let key = CacheKey::new(CacheOp::ToolVersion, argv.iter().cloned());
        if let Some(CacheValue::Text(v)) = ctx.cached(&key) {
            return Some(v);
        }
        let spec = CommandSpec::new(program.clone(), self.kind().tag()).args(args.iter().cloned());
        let version = match ctx.run(&spec) {
            Ok(out) => out.stdout.lines().next().unwrap_or("").trim().to_string(),
            Err(e) => {
                warn!("{} version query failed: {}", self.kind().tag(), e);
                String::from("unknown")
            }
        };
        ctx.remember(key, CacheValue::Text(version.clone()));
        Some(version)
    }
}

#[derive(Debug, Clone, Default)]
/// The scanners configured for a run, in dispatch order.
pub struct ScannerSet {
    scanners: Vec<Scanner>,
}

impl ScannerSet {
    pub fn from_effective(eff: &Effective) -> Self {
        let mut scanners = Vec::new();
        // Manifest names are more specific than extensions: audit first.
        if let Some(cfg) = &eff.audit {
            scanners.push(Scanner::Audit(AuditScanner::new(cfg.clone())));
        }
        if let Some(cfg) = &eff.lint {
            scanners.push(Scanner::Lint(LintScanner::new(cfg.clone())));
        }
        Self { scanners }
    }

    pub fn new(scanners: Vec<Scanner>) -> Self {
        Self { scanners }
    }

    pub fn select(&self, path: &str) -> Option<&Scanner> {
        self.scanners.iter().find(|s| s.handles(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scanner> {
        self.scanners.iter()
    }
}

#[derive(Debug, Deserialize)]
struct WireFinding {
    line: usize,
    #[serde(default)]
    column: usize,
    #[serde(default)]
    severity: Option<String>,
    rule: String,
    message: String,
}

fn run_scanner(
    ctx: &mut RunContext,
    repo: &Repository,
    path: &str,
    kind: ScannerKind,
    cfg: &ScannerCfg,
) -> Result<Vec<RawIssue>, Unavailable> {
    let (program, args) = cfg
        .command
        .split_first()
        .ok_or_else(|| Unavailable::new("scan", "empty scanner command"))?;
    let abs = repo.root().join(path).to_string_lossy().to_string();
    let uses_path = cfg.command.iter().any(|a| a.contains(FILE_PLACEHOLDER));
    let mut spec = CommandSpec::new(program.replace(FILE_PLACEHOLDER, &abs), kind.tag())
        .args(args.iter().map(|a| a.replace(FILE_PLACEHOLDER, &abs)))
        .current_dir(repo.root())
        .allow_exit_codes(cfg.allowed_exit_codes.as_deref().unwrap_or(&[0]));
    if !uses_path {
        spec = spec.stdin(repo.read_file(path)?);
    }
    let out = ctx
        .run(&spec)
        .map_err(|e| Unavailable::new("scan", e.to_string()))?;
    parse_findings(&out.stdout, kind)
}

/// Parse normalized scanner output. Blank output means no findings.
pub fn parse_findings(stdout: &str, kind: ScannerKind) -> Result<Vec<RawIssue>, Unavailable> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let wire: Vec<WireFinding> = serde_json::from_str(stdout)
        .map_err(|e| Unavailable::new("scan", format!("unexpected scanner output: {}", e)))?;
    Ok(wire
        .into_iter()
        .map(|w| RawIssue {
            line: w.line,
            column: w.column,
            severity: w
                .severity
                .as_deref()
                .map(Severity::from_label)
                .unwrap_or_else(|| kind.default_severity()),
            rule: w.rule,
            message: w.message,
            tool: kind.tag().to_string(),
        })
        .collect())
}
