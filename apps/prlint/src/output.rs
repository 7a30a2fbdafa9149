//! Output rendering for review runs.
//!
//! Supports `human` (default) and `json` outputs. The JSON form lists each
//! pull request's comments, skipped files, and auto-approvable files, plus
//! tool versions, collapsed alerts, and the counters snapshot.

use crate::models::{RunReport, Severity};
use crate::utils::use_colors;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

/// Print a run report in the requested format.
pub fn print_review(report: &RunReport, output: &str) {
    match output {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&compose_review_json(report))
                .unwrap_or_else(|_| "{}".to_string())
        ),
        _ => {
            for line in compose_review_human(report, use_colors(output)) {
                println!("{}", line);
            }
        }
    }
}

/// Human-readable lines, one per comment, skip, and alert, then a summary.
pub fn compose_review_human(report: &RunReport, color: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for pr in &report.pull_requests {
        let title = match pr.number {
            Some(n) => format!("── Pull request #{} ({}..{})", n, short(&pr.base), short(&pr.head)),
            None => format!("── {}..{}", short(&pr.base), short(&pr.head)),
        };
        lines.push(if color {
            title.bold().to_string()
        } else {
            title
        });
        for c in &pr.comments {
            let sev = match c.issue.severity {
                Severity::Error => "⟦error⟧",
                Severity::Warning => "⟦warn⟧",
                Severity::Info => "⟦info⟧",
            };
            let sev = if color {
                match c.issue.severity {
                    Severity::Error => sev.red().bold().to_string(),
                    Severity::Warning => sev.yellow().bold().to_string(),
                    Severity::Info => sev.blue().bold().to_string(),
                }
            } else {
                sev.to_string()
            };
            let loc = format!("{}:{}:{}", c.file, c.issue.line, c.issue.column);
            let loc = if color { loc.bold().to_string() } else { loc };
            lines.push(format!(
                "{} {} (position {}) ❲{}/{}❳ — {}",
                sev, loc, c.position, c.issue.tool, c.issue.rule, c.issue.message
            ));
        }
        for s in &pr.skipped {
            let tag = if color {
                "⏭️  skipped:".yellow().bold().to_string()
            } else {
                "⏭️  skipped:".to_string()
            };
            lines.push(format!("{} {} — {}", tag, s.file, s.reason));
        }
        for f in &pr.auto_approvable {
            let tag = if color {
                "✔ no reviewable lines:".green().to_string()
            } else {
                "✔ no reviewable lines:".to_string()
            };
            lines.push(format!("{} {}", tag, f));
        }
    }
    for a in &report.alerts {
        let tag = if color {
            "note:".cyan().bold().to_string()
        } else {
            "note:".to_string()
        };
        lines.push(format!("{} {}", tag, a));
    }
    let comments: usize = report.pull_requests.iter().map(|p| p.comments.len()).sum();
    let errors: usize = report.pull_requests.iter().map(|p| p.errors()).sum();
    let skipped: usize = report.pull_requests.iter().map(|p| p.skipped.len()).sum();
    let summary = format!(
        "— Summary — pull_requests={} comments={} errors={} skipped={}",
        report.pull_requests.len(),
        comments,
        errors,
        skipped
    );
    lines.push(if color {
        summary.bold().to_string()
    } else {
        summary
    });
    lines
}

/// Compose the review JSON object (pure) for testing/snapshot purposes.
pub fn compose_review_json(report: &RunReport) -> JsonVal {
    let prs: Vec<_> = report
        .pull_requests
        .iter()
        .map(|pr| {
            json!({
                "number": pr.number,
                "base": pr.base,
                "head": pr.head,
                "comments": pr.comments,
                "skipped": pr.skipped,
                "auto_approvable": pr.auto_approvable,
            })
        })
        .collect();
    json!({
        "pull_requests": prs,
        "tools": report.tools,
        "alerts": report.alerts,
        "counters": report.counters,
    })
}

fn short(rev: &str) -> &str {
    let is_hash = rev.len() >= 12 && rev.bytes().all(|b| b.is_ascii_hexdigit());
    if is_hash {
        &rev[..12]
    } else {
        rev
    }
}
