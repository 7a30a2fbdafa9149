//! Blame provider: the commit that last touched each line of a file at a revision.

use super::{file_exists_at, Repository};
use crate::cache::{CacheKey, CacheOp, CacheValue};
use crate::context::RunContext;
use crate::error::Unavailable;
use crate::models::revision::BlameMap;
use log::warn;
use regex::Regex;
use std::sync::OnceLock;

// Porcelain group header: <hash> <orig-line> <final-line> [<lines-in-group>]
fn porcelain_header() -> Result<&'static Regex, Unavailable> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([0-9a-f]{40}|[0-9a-f]{64}) \d+ (\d+)(?: \d+)?$").ok())
        .as_ref()
        .ok_or_else(|| Unavailable::new("blame", "porcelain header pattern failed to compile"))
}

/// Blame every line of `path` as of `rev`.
///
/// Always pass the head revision: blame describes the file as the pull
/// request leaves it. Unavailable when the file is absent at `rev`, the
/// blame command fails, or its output does not cover every line.
pub fn blame_file(
    ctx: &mut RunContext,
    repo: &Repository,
    rev: &str,
    path: &str,
) -> Result<BlameMap, Unavailable> {
    let key = CacheKey::new(
        CacheOp::Blame,
        [repo.identity(), rev.to_string(), path.to_string()],
    );
    if let Some(CacheValue::Blame(map)) = ctx.cached(&key) {
        return Ok(map);
    }
    if !file_exists_at(ctx, repo, rev, path)? {
        return Err(Unavailable::new(
            "blame",
            format!("{} does not exist at {}", path, rev),
        ));
    }
    let spec = repo
        .git()
        .args(["blame", "--porcelain", rev, "--", path]);
    let out = ctx.run(&spec).map_err(|e| {
        warn!("blame {}@{} unavailable: {}", path, rev, e);
        Unavailable::new("blame", e.to_string())
    })?;
    let map = parse_porcelain(&out.stdout)?;
    ctx.remember(key, CacheValue::Blame(map.clone()));
    Ok(map)
}

fn parse_porcelain(stdout: &str) -> Result<BlameMap, Unavailable> {
    let header = porcelain_header()?;
    let mut map = BlameMap::new();
    let mut content_lines = 0usize;
    for line in stdout.lines() {
        if line.starts_with('\t') {
            content_lines += 1;
            continue;
        }
        if let Some(caps) = header.captures(line) {
            let final_line: usize = caps[2]
                .parse()
                .map_err(|_| Unavailable::new("blame", format!("bad line number in `{}`", line)))?;
            map.insert(final_line, caps[1].to_string());
        }
    }
    if map.len() != content_lines {
        return Err(Unavailable::new(
            "blame",
            format!(
                "porcelain covered {} of {} line(s)",
                map.len(),
                content_lines
            ),
        ));
    }
    Ok(map)
}
