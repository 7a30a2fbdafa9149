//! Revision-level data: blame maps, commit sets, and pull request identity.

use std::collections::{BTreeMap, HashSet};

/// Line number (1-based) to the full hash of the commit that last touched it.
pub type BlameMap = BTreeMap<usize, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Commits that make up a pull request, from base (exclusive) to head.
pub struct CommitSet {
    hashes: HashSet<String>,
}

impl CommitSet {
    pub fn new<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hashes: hashes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A pull request as far as attribution is concerned: its number and base.
///
/// The head is the verified checkout shared by every pull request in a run.
pub struct PullRequest {
    pub number: Option<u64>,
    pub base: String,
}

impl PullRequest {
    /// Parse `NUM:BASE` as accepted by `--pr`.
    pub fn parse(s: &str) -> Option<Self> {
        let (num, base) = s.split_once(':')?;
        let number = num.trim().parse::<u64>().ok()?;
        let base = base.trim();
        if base.is_empty() {
            return None;
        }
        Some(Self {
            number: Some(number),
            base: base.to_string(),
        })
    }

    pub fn label(&self) -> String {
        match self.number {
            Some(n) => format!("#{}", n),
            None => format!("{}..HEAD", self.base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_parse() {
        let pr = PullRequest::parse("42:origin/main").unwrap();
        assert_eq!(pr.number, Some(42));
        assert_eq!(pr.base, "origin/main");
        assert!(PullRequest::parse("x:main").is_none());
        assert!(PullRequest::parse("7:").is_none());
        assert!(PullRequest::parse("main").is_none());
    }

    #[test]
    fn test_commit_set_membership() {
        let set = CommitSet::new(["aaa", "bbb"]);
        assert!(set.contains("aaa"));
        assert!(!set.contains("ccc"));
        assert_eq!(set.len(), 2);
    }
}
