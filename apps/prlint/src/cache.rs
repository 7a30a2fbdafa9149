//! Run-scoped memoization of expensive lookups.
//!
//! Keys are structural: an operation tag plus its ordered arguments. Values
//! live for the run; there is no eviction and no persistence.

use crate::models::diff::DiffSet;
use crate::models::revision::{BlameMap, CommitSet};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The operation that produced a cached value.
pub enum CacheOp {
    Diff,
    Blame,
    Commits,
    TreeListing,
    ResolveRev,
    ToolVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub op: CacheOp,
    pub args: Vec<String>,
}

impl CacheKey {
    pub fn new<I, S>(op: CacheOp, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            op,
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A previously computed result. `Flag(false)` and `Text("")` are real values.
pub enum CacheValue {
    Diff(DiffSet),
    Blame(BlameMap),
    Commits(CommitSet),
    Text(String),
    Flag(bool),
}

#[derive(Debug, Default)]
pub struct MemoCache {
    entries: HashMap<CacheKey, CacheValue>,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means never computed; any stored value, even an empty one, is `Some`.
    pub fn get(&self, key: &CacheKey) -> Option<&CacheValue> {
        self.entries.get(key)
    }

    /// Store unconditionally, replacing any earlier entry.
    pub fn put(&mut self, key: CacheKey, value: CacheValue) {
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_distinct_from_false() {
        let mut cache = MemoCache::new();
        let key = CacheKey::new(CacheOp::TreeListing, ["repo", "abc", "a.py"]);
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), CacheValue::Flag(false));
        assert_eq!(cache.get(&key), Some(&CacheValue::Flag(false)));
    }

    #[test]
    fn test_structural_key_equality() {
        let mut cache = MemoCache::new();
        let a = CacheKey::new(CacheOp::ToolVersion, vec![String::from("lint")]);
        cache.put(a, CacheValue::Text("1.0".into()));
        let b = CacheKey::new(CacheOp::ToolVersion, ["lint"]);
        assert_eq!(cache.get(&b), Some(&CacheValue::Text("1.0".into())));
        // Same arguments under another operation do not collide.
        let c = CacheKey::new(CacheOp::ResolveRev, ["lint"]);
        assert!(cache.get(&c).is_none());
        // Argument order matters.
        let d = CacheKey::new(CacheOp::Diff, ["x", "y"]);
        cache.put(d, CacheValue::Flag(true));
        assert!(cache.get(&CacheKey::new(CacheOp::Diff, ["y", "x"])).is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let mut cache = MemoCache::new();
        let key = CacheKey::new(CacheOp::ResolveRev, ["HEAD"]);
        cache.put(key.clone(), CacheValue::Text("a".into()));
        cache.put(key.clone(), CacheValue::Text("b".into()));
        assert_eq!(cache.get(&key), Some(&CacheValue::Text("b".into())));
        assert_eq!(cache.len(), 1);
    }
}
