//! Attribution: decide which whole-file findings a pull request introduced.
//!
//! A finding is kept only when both hold:
//! - its line is in the file's changed-line set (comments can only anchor
//!   inside the diff, and an untouched line is necessarily pre-existing);
//! - the line blames to a commit in the pull request's commit set (a changed
//!   line whose last change came from outside the range is not the PR's).
//!
//! Kept findings carry the line's 1-based rank in the changed-line set as
//! their diff-relative position. Only the anchor line of a multi-line finding
//! is checked.

use crate::models::revision::{BlameMap, CommitSet};
use crate::models::{AttributedIssue, RawIssue};
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Rank of each changed line, 1-based, in ascending line order.
pub fn positions(changed_lines: &BTreeSet<usize>) -> HashMap<usize, usize> {
    changed_lines
        .iter()
        .enumerate()
        .map(|(i, line)| (*line, i + 1))
        .collect()
}

/// Filter one file's findings down to those attributable to the pull request.
///
/// Output keeps input order. Inputs are only read.
pub fn attribute(
    file: &str,
    issues: &[RawIssue],
    changed_lines: &BTreeSet<usize>,
    blame: &BlameMap,
    commits: &CommitSet,
) -> Vec<AttributedIssue> {
    let ranks = positions(changed_lines);
    let mut out = Vec::new();
    for issue in issues {
        let Some(&position) = ranks.get(&issue.line) else {
            continue;
        };
        match blame.get(&issue.line) {
            Some(hash) if commits.contains(hash) => out.push(AttributedIssue {
                file: file.to_string(),
                position,
                issue: issue.clone(),
            }),
            Some(hash) => debug!(
                "{}:{} [{}] blames to {} outside the pull request",
                file, issue.line, issue.rule, hash
            ),
            None => debug!("{}:{} has no blame entry", file, issue.line),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use pretty_assertions::assert_eq;

    const PR1: &str = "1111111111111111111111111111111111111111";
    const PR2: &str = "2222222222222222222222222222222222222222";
    const OLD: &str = "0000000000000000000000000000000000000abc";

    fn issue(line: usize, rule: &str) -> RawIssue {
        RawIssue {
            line,
            column: 4,
            severity: Severity::Error,
            rule: rule.into(),
            message: format!("{} at {}", rule, line),
            tool: "lint".into(),
        }
    }

    fn changed(lines: &[usize]) -> BTreeSet<usize> {
        lines.iter().copied().collect()
    }

    fn blame(entries: &[(usize, &str)]) -> BlameMap {
        entries.iter().map(|(l, h)| (*l, h.to_string())).collect()
    }

    #[test]
    fn test_positions_are_ordinal_ranks() {
        let p = positions(&changed(&[40, 3, 17]));
        assert_eq!(p[&3], 1);
        assert_eq!(p[&17], 2);
        assert_eq!(p[&40], 3);
    }

    #[test]
    fn test_issue_off_the_diff_is_dropped() {
        let commits = CommitSet::new([PR1]);
        let out = attribute(
            "a.py",
            &[issue(2, "X")],
            &changed(&[5]),
            &blame(&[(2, PR1), (5, PR1)]),
            &commits,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_changed_line_blamed_outside_pr_is_dropped() {
        let commits = CommitSet::new([PR1]);
        let out = attribute(
            "a.py",
            &[issue(5, "X")],
            &changed(&[5]),
            &blame(&[(5, OLD)]),
            &commits,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_blame_entry_is_dropped() {
        let commits = CommitSet::new([PR1]);
        let out = attribute("a.py", &[issue(5, "X")], &changed(&[5]), &blame(&[]), &commits);
        assert!(out.is_empty());
    }

    #[test]
    fn test_accepted_issues_keep_order_and_fields() {
        let commits = CommitSet::new([PR1, PR2]);
        let issues = vec![issue(30, "B"), issue(10, "A"), issue(12, "C"), issue(30, "D")];
        let out = attribute(
            "src/m.py",
            &issues,
            &changed(&[10, 11, 30]),
            &blame(&[(10, PR1), (11, OLD), (12, PR2), (30, PR2)]),
            &commits,
        );
        let got: Vec<(String, usize, String)> = out
            .iter()
            .map(|a| (a.file.clone(), a.position, a.issue.rule.clone()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("src/m.py".to_string(), 3, "B".to_string()),
                ("src/m.py".to_string(), 1, "A".to_string()),
                ("src/m.py".to_string(), 3, "D".to_string()),
            ]
        );
        assert_eq!(out[1].issue, issues[1]);
    }

    #[test]
    fn test_attribution_is_stable() {
        let commits = CommitSet::new([PR1]);
        let issues = vec![issue(1, "A"), issue(2, "B")];
        let lines = changed(&[1, 2]);
        let b = blame(&[(1, PR1), (2, PR1)]);
        let first = attribute("a.py", &issues, &lines, &b, &commits);
        let second = attribute("a.py", &issues, &lines, &b, &commits);
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|a| a.position).collect::<Vec<_>>(), vec![1, 2]);
    }
}
