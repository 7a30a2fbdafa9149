//! Git adapter: a verified repository handle plus the lookups built on it.
//!
//! Every lookup takes a `&Repository`, which only `Repository::open` creates
//! after checking that the working copy sits at the expected commit. All git
//! invocations go through the run's process runner and are memoized in the
//! run's cache.

pub mod blame;
pub mod diff;

use crate::cache::{CacheKey, CacheOp, CacheValue};
use crate::context::RunContext;
use crate::error::{FatalError, Unavailable};
use crate::models::revision::CommitSet;
use crate::process::CommandSpec;
use log::info;
use std::path::{Path, PathBuf};

/// `git -C <root>` with the `git` timing bucket.
pub(crate) fn git(root: &Path) -> CommandSpec {
    CommandSpec::new("git", "git")
        .arg("-C")
        .arg(root.to_string_lossy())
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A working copy verified to be checked out at `head`.
pub struct Repository {
    root: PathBuf,
    head: String,
}

impl Repository {
    /// Verify the checkout at `path` matches `expected_head` (hash or ref).
    ///
    /// Any mismatch is fatal: nothing downstream may diff, blame, or read files
    /// from a checkout that is not the revision under review.
    pub fn open(
        ctx: &mut RunContext,
        path: &Path,
        expected_head: &str,
    ) -> Result<Self, FatalError> {
        // 128 is git's "not a repository": deterministic, so not worth a retry.
        let toplevel = ctx
            .run(
                &git(path)
                    .args(["rev-parse", "--show-toplevel"])
                    .allow_exit_codes(&[0, 128]),
            )
            .map_err(|e| FatalError::MissingRepository(format!("{}: {}", path.display(), e)))?;
        let root = PathBuf::from(toplevel.stdout.trim());
        if toplevel.exit_code != 0 || root.as_os_str().is_empty() {
            return Err(FatalError::MissingRepository(format!(
                "{}: {}",
                path.display(),
                toplevel.stderr.trim()
            )));
        }

        let expected = rev_parse_commit(ctx, &root, expected_head)
            .ok_or_else(|| FatalError::UnresolvableRevision(expected_head.to_string()))?;
        let actual = rev_parse_commit(ctx, &root, "HEAD")
            .ok_or_else(|| FatalError::UnresolvableRevision("HEAD".to_string()))?;
        if expected != actual {
            return Err(FatalError::CheckoutMismatch { expected, actual });
        }
        info!("checkout verified at {} ({})", actual, root.display());
        Ok(Self { root, head: actual })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full hash of the verified head.
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Identity used in cache keys.
    pub fn identity(&self) -> String {
        self.root.to_string_lossy().to_string()
    }

    pub(crate) fn git(&self) -> CommandSpec {
        git(&self.root)
    }

    /// Read a file from the verified working copy.
    pub fn read_file(&self, path: &str) -> Result<String, Unavailable> {
        std::fs::read_to_string(self.root.join(path))
            .map_err(|e| Unavailable::new("file", format!("{}: {}", path, e)))
    }
}

/// Resolve `rev` to a full commit hash; `None` if it does not name a commit.
fn rev_parse_commit(ctx: &mut RunContext, root: &Path, rev: &str) -> Option<String> {
    // Exit 1 is git's "no such revision": deterministic, so not worth a retry.
    let spec = git(root)
        .args(["rev-parse", "--verify", "--quiet"])
        .arg(format!("{}^{{commit}}", rev))
        .allow_exit_codes(&[0, 1]);
    let out = ctx.run(&spec).ok()?;
    let hash = out.stdout.trim();
    if out.exit_code != 0 || hash.is_empty() {
        return None;
    }
    Some(hash.to_string())
}

/// Resolve a revision against the verified repository, memoized.
pub fn resolve_rev(
    ctx: &mut RunContext,
    repo: &Repository,
    rev: &str,
) -> Result<String, Unavailable> {
    let key = CacheKey::new(CacheOp::ResolveRev, [repo.identity(), rev.to_string()]);
    if let Some(CacheValue::Text(hash)) = ctx.cached(&key) {
        return Ok(hash);
    }
    let hash = rev_parse_commit(ctx, repo.root(), rev)
        .ok_or_else(|| Unavailable::new("revision", format!("{} does not name a commit", rev)))?;
    ctx.remember(key, CacheValue::Text(hash.clone()));
    Ok(hash)
}

/// Commits reachable from `head` but not from `base`.
pub fn commit_set(
    ctx: &mut RunContext,
    repo: &Repository,
    base: &str,
    head: &str,
) -> Result<CommitSet, Unavailable> {
    let key = CacheKey::new(
        CacheOp::Commits,
        [repo.identity(), base.to_string(), head.to_string()],
    );
    if let Some(CacheValue::Commits(set)) = ctx.cached(&key) {
        return Ok(set);
    }
    let spec = repo
        .git()
        .arg("rev-list")
        .arg(format!("{}..{}", base, head));
    let out = ctx
        .run(&spec)
        .map_err(|e| Unavailable::new("commit set", e.to_string()))?;
    let set = CommitSet::new(
        out.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty()),
    );
    ctx.remember(key, CacheValue::Commits(set.clone()));
    Ok(set)
}

/// Whether `path` exists in the tree of `rev`.
pub fn file_exists_at(
    ctx: &mut RunContext,
    repo: &Repository,
    rev: &str,
    path: &str,
) -> Result<bool, Unavailable> {
    let key = CacheKey::new(
        CacheOp::TreeListing,
        [repo.identity(), rev.to_string(), path.to_string()],
    );
    if let Some(CacheValue::Flag(exists)) = ctx.cached(&key) {
        return Ok(exists);
    }
    let spec = repo
        .git()
        .args(["ls-tree", "-z", "--name-only", "--full-tree", rev, "--", path]);
    let out = ctx
        .run(&spec)
        .map_err(|e| Unavailable::new("tree listing", e.to_string()))?;
    // -z keeps names verbatim; without it git C-quotes unusual characters.
    let exists = out.stdout.split('\0').any(|l| l == path);
    ctx.remember(key, CacheValue::Flag(exists));
    Ok(exists)
}
