//! Per pull request review: diff, scan, blame, attribute, collapse.
//!
//! Files run one at a time. A file whose diff, scan, or blame is unavailable
//! is recorded as skipped with its reason; it never counts as clean.

use crate::attribution::attribute;
use crate::context::RunContext;
use crate::dedup::collapse;
use crate::error::Unavailable;
use crate::git::blame::blame_file;
use crate::git::diff::diff_files;
use crate::git::{commit_set, resolve_rev, Repository};
use crate::models::diff::{DiffFilter, DiffRecord, FileStatus};
use crate::models::revision::{CommitSet, PullRequest};
use crate::models::{AttributedIssue, ReviewReport, RunReport, SkippedFile};
use crate::scanner::{Scan, Scanner, ScannerSet};
use log::info;
use std::collections::BTreeMap;

/// Stand-in file name when a whole pull request could not be diffed.
pub const ALL_FILES: &str = "*";

/// Review every pull request against the verified head, then drain alerts
/// and snapshot counters into the run report.
pub fn run(
    ctx: &mut RunContext,
    repo: &Repository,
    filter: &DiffFilter,
    scanners: &ScannerSet,
    prs: &[PullRequest],
) -> RunReport {
    let mut tools = BTreeMap::new();
    for s in scanners.iter() {
        if let Some(v) = s.version(ctx) {
            tools.insert(s.kind().tag().to_string(), v);
        }
    }
    let pull_requests = prs
        .iter()
        .map(|pr| review_pull_request(ctx, repo, filter, scanners, pr))
        .collect();
    RunReport {
        pull_requests,
        tools,
        alerts: ctx.alerts.drain(),
        counters: ctx.counters.dump(),
    }
}

pub fn review_pull_request(
    ctx: &mut RunContext,
    repo: &Repository,
    filter: &DiffFilter,
    scanners: &ScannerSet,
    pr: &PullRequest,
) -> ReviewReport {
    let head = repo.head().to_string();
    let mut report = ReviewReport {
        number: pr.number,
        base: pr.base.clone(),
        head: head.clone(),
        comments: Vec::new(),
        skipped: Vec::new(),
        auto_approvable: Vec::new(),
    };

    let diff = resolve_rev(ctx, repo, &pr.base)
        .and_then(|base| diff_files(ctx, repo, &base, &head, filter).map(|d| (base, d)));
    let (base, diff) = match diff {
        Ok(v) => v,
        Err(u) => {
            skip(ctx, &mut report, ALL_FILES, &u);
            return report;
        }
    };
    let commits = commit_set(ctx, repo, &base, &head);
    info!(
        "reviewing {}: {} changed file(s)",
        pr.label(),
        diff.len()
    );

    for record in diff.values() {
        if record.status == FileStatus::Removed {
            ctx.counters.bump("files.removed");
            continue;
        }
        if record.is_auto_approvable() {
            ctx.counters.bump("files.auto_approvable");
            report.auto_approvable.push(record.path.clone());
            continue;
        }
        let Some(scanner) = scanners.select(&record.path) else {
            ctx.counters.bump("files.unscanned");
            continue;
        };
        let result = commits
            .as_ref()
            .map_err(Clone::clone)
            .and_then(|c| review_file(ctx, repo, scanner, record, c));
        match result {
            Ok(issues) => report.comments.extend(issues),
            Err(u) => skip(ctx, &mut report, &record.path, &u),
        }
    }
    report
}

fn review_file(
    ctx: &mut RunContext,
    repo: &Repository,
    scanner: &Scanner,
    record: &DiffRecord,
    commits: &CommitSet,
) -> Result<Vec<AttributedIssue>, Unavailable> {
    let raw = scanner.scan(ctx, repo, &record.path)?;
    ctx.counters.bump("files.scanned");
    ctx.counters.increment("issues.raw", raw.len() as u64);
    let blame = blame_file(ctx, repo, repo.head(), &record.path)?;
    let attributed = attribute(
        &record.path,
        &raw,
        &record.changed_lines,
        &blame,
        commits,
    );
    let before = attributed.len();
    let kept = collapse(attributed);
    ctx.counters
        .increment("issues.duplicate", (before - kept.len()) as u64);
    ctx.counters
        .increment("issues.attributed", kept.len() as u64);
    Ok(kept)
}

fn skip(ctx: &mut RunContext, report: &mut ReviewReport, file: &str, why: &Unavailable) {
    info!("skipping {} in {}: {}", file, report.base, why);
    ctx.counters.bump("files.skipped");
    // One categorical alert per reason so repeats collapse into a count.
    ctx.alerts
        .push(format!("Attribution skipped: {} unavailable", why.what));
    report.skipped.push(SkippedFile {
        file: file.to_string(),
        reason: why.to_string(),
    });
}
