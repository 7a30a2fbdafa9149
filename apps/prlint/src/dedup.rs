//! Duplicate collapsing for findings emitted twice by overlapping rule sets.

use crate::models::{AttributedIssue, RawIssue, Severity};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Fields that make two findings the same finding.
pub struct IssueKey {
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub rule: String,
    pub message: String,
}

/// Anything carrying a finding that can be deduplicated.
pub trait Finding {
    fn issue(&self) -> &RawIssue;

    fn key(&self) -> IssueKey {
        let i = self.issue();
        IssueKey {
            line: i.line,
            column: i.column,
            severity: i.severity,
            rule: i.rule.clone(),
            message: i.message.clone(),
        }
    }
}

impl Finding for RawIssue {
    fn issue(&self) -> &RawIssue {
        self
    }
}

impl Finding for AttributedIssue {
    fn issue(&self) -> &RawIssue {
        &self.issue
    }
}

/// Drop later copies of a finding, keeping the first and the input order.
pub fn collapse<T: Finding>(items: Vec<T>) -> Vec<T> {
    let mut seen: HashSet<IssueKey> = HashSet::with_capacity(items.len());
    items.into_iter().filter(|it| seen.insert(it.key())).collect()
}
