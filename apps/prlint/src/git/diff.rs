//! Diff provider: which files a pull request changed and which head lines.
//!
//! Statuses and exact paths come from `git diff --raw -z`, changed lines from
//! the hunk headers of a zero-context patch. With `--unified=0` every line in
//! a hunk's `+start,count` range is an added line, so no body parsing is needed.

use super::Repository;
use crate::cache::{CacheKey, CacheOp, CacheValue};
use crate::context::RunContext;
use crate::error::Unavailable;
use crate::models::diff::{DiffFilter, DiffRecord, DiffSet, FileStatus};
use crate::process::CommandSpec;
use log::{debug, warn};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

fn hunk_header() -> Result<&'static Regex, Unavailable> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").ok())
        .as_ref()
        .ok_or_else(|| Unavailable::new("diff", "hunk header pattern failed to compile"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One entry of `git diff --raw -z`.
struct RawEntry {
    old_mode: String,
    new_mode: String,
    old_blob: String,
    new_blob: String,
    status: char,
    old_path: Option<String>,
    path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FilePatch {
    lines: BTreeSet<usize>,
    text: String,
}

/// Files changed between `base` and `head`, restricted by `filter`.
///
/// Memoized per (repository, base, head, filter). `Unavailable` means the
/// comparison itself failed; callers must not read it as "nothing changed".
pub fn diff_files(
    ctx: &mut RunContext,
    repo: &Repository,
    base: &str,
    head: &str,
    filter: &DiffFilter,
) -> Result<DiffSet, Unavailable> {
    let key = CacheKey::new(
        CacheOp::Diff,
        [
            repo.identity(),
            base.to_string(),
            head.to_string(),
            filter.fingerprint(),
        ],
    );
    if let Some(CacheValue::Diff(set)) = ctx.cached(&key) {
        return Ok(set);
    }

    let raw = ctx
        .run(&diff_cmd(repo, base, head).args(["--raw", "-z", "--no-abbrev"]))
        .map_err(|e| {
            warn!("diff {}..{} unavailable: {}", base, head, e);
            Unavailable::new("diff", e.to_string())
        })?;
    let patch = ctx
        .run(&diff_cmd(repo, base, head).arg("--unified=0"))
        .map_err(|e| {
            warn!("patch {}..{} unavailable: {}", base, head, e);
            Unavailable::new("diff", e.to_string())
        })?;

    let entries = parse_raw(&raw.stdout);
    let mut patches = split_patches(&patch.stdout, hunk_header()?);
    let set = build_diff_set(entries, &mut patches, filter);
    debug!("diff {}..{}: {} file(s) after filtering", base, head, set.len());
    ctx.remember(key, CacheValue::Diff(set.clone()));
    Ok(set)
}

fn diff_cmd(repo: &Repository, base: &str, head: &str) -> CommandSpec {
    // Fixed prefixes so diff.noprefix or diff.srcPrefix cannot reshape headers.
    repo.git().args([
        "-c",
        "core.quotepath=off",
        "diff",
        "-M",
        "--no-color",
        "--no-ext-diff",
        "--src-prefix=a/",
        "--dst-prefix=b/",
        base,
        head,
    ])
}

// NUL-separated records, paths verbatim:
// :100644 100755 <old> <new> M\0path\0
// :100644 100644 <old> <new> R087\0old\0new\0
fn parse_raw(stdout: &str) -> Vec<RawEntry> {
    let mut out = Vec::new();
    let mut fields = stdout.split('\0');
    while let Some(meta) = fields.next() {
        let Some(meta) = meta.trim_start_matches('\n').strip_prefix(':') else {
            continue;
        };
        let meta: Vec<&str> = meta.split_whitespace().collect();
        if meta.len() < 5 {
            continue;
        }
        let Some(status) = meta[4].chars().next() else {
            continue;
        };
        let Some(first) = fields.next() else {
            break;
        };
        let (old_path, path) = if matches!(status, 'R' | 'C') {
            match fields.next() {
                Some(second) => (Some(first.to_string()), second.to_string()),
                None => break,
            }
        } else {
            (None, first.to_string())
        };
        out.push(RawEntry {
            old_mode: meta[0].to_string(),
            new_mode: meta[1].to_string(),
            old_blob: meta[2].to_string(),
            new_blob: meta[3].to_string(),
            status,
            old_path,
            path,
        });
    }
    out
}

/// Split a multi-file patch into per-file sections keyed by head path
/// (base path for deletions).
fn split_patches(stdout: &str, hunk: &Regex) -> HashMap<String, FilePatch> {
    let mut out = HashMap::new();
    let mut section: Vec<&str> = Vec::new();
    for line in stdout.lines() {
        if line.starts_with("diff --git ") && !section.is_empty() {
            if let Some((path, fp)) = parse_section(&section, hunk) {
                out.insert(path, fp);
            }
            section.clear();
        }
        section.push(line);
    }
    if let Some((path, fp)) = parse_section(&section, hunk) {
        out.insert(path, fp);
    }
    out
}

fn parse_section(lines: &[&str], hunk: &Regex) -> Option<(String, FilePatch)> {
    let mut source: Option<String> = None;
    let mut target: Option<String> = None;
    let mut renamed_to: Option<String> = None;
    let mut changed = BTreeSet::new();
    let mut in_hunks = false;
    for line in lines {
        if !in_hunks {
            if let Some(p) = line.strip_prefix("--- ") {
                source = header_path(p, "a/");
                continue;
            }
            if let Some(p) = line.strip_prefix("+++ ") {
                target = header_path(p, "b/");
                continue;
            }
            if let Some(p) = line
                .strip_prefix("rename to ")
                .or_else(|| line.strip_prefix("copy to "))
            {
                renamed_to = Some(unquote(p));
                continue;
            }
        }
        if let Some(caps) = hunk.captures(line) {
            in_hunks = true;
            let start: usize = caps[1].parse().unwrap_or(0);
            let count: usize = caps.get(2).map_or(1, |m| m.as_str().parse().unwrap_or(1));
            if start > 0 {
                changed.extend(start..start + count);
            }
        }
    }
    let path = target
        .or(renamed_to)
        .or(source)
        .or_else(|| lines.first().and_then(|l| git_line_path(l)))?;
    Some((
        path,
        FilePatch {
            lines: changed,
            text: lines.join("\n"),
        },
    ))
}

/// Path from a `---`/`+++` header. Git appends a tab after names containing
/// a space and C-quotes names with special characters.
fn header_path(raw: &str, prefix: &str) -> Option<String> {
    let raw = raw.strip_suffix('\t').unwrap_or(raw);
    if raw == "/dev/null" {
        return None;
    }
    let path = unquote(raw);
    Some(match path.strip_prefix(prefix) {
        Some(p) => p.to_string(),
        None => path,
    })
}

/// Head path from `diff --git a/P b/P`, used when a section has no
/// `---`/`+++` lines (mode-only changes).
fn git_line_path(line: &str) -> Option<String> {
    let rest = line.strip_prefix("diff --git ")?;
    if rest.starts_with('"') || rest.ends_with('"') {
        let (_, b) = split_quoted_pair(rest)?;
        return unquote(b).strip_prefix("b/").map(str::to_string);
    }
    // Unquoted and not a rename: both halves name the same path.
    let n = rest.len().checked_sub(5)? / 2;
    let a = rest.get(2..2 + n)?;
    let b = rest.get(2 + n + 3..)?;
    (rest.starts_with("a/") && rest.get(2 + n..2 + n + 3)? == " b/" && a == b)
        .then(|| b.to_string())
}

/// Split `X Y` where either side may be a C-quoted string.
fn split_quoted_pair(rest: &str) -> Option<(&str, &str)> {
    if rest.starts_with('"') {
        let bytes = rest.as_bytes();
        let mut i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => return Some((&rest[..=i], rest.get(i + 2..)?)),
                _ => i += 1,
            }
        }
        None
    } else {
        let idx = rest.find(" \"")?;
        Some((&rest[..idx], &rest[idx + 1..]))
    }
}

/// Undo git's C-style quoting; unquoted input is returned as is.
fn unquote(s: &str) -> String {
    let Some(inner) = s.strip_prefix('"').and_then(|t| t.strip_suffix('"')) else {
        return s.to_string();
    };
    let mut bytes = Vec::with_capacity(inner.len());
    let mut it = inner.bytes().peekable();
    while let Some(b) = it.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match it.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0c),
            Some(b'v') => bytes.push(0x0b),
            Some(d @ b'0'..=b'7') => {
                let mut v = u32::from(d - b'0');
                for _ in 0..2 {
                    match it.peek() {
                        Some(&o @ b'0'..=b'7') => {
                            v = v * 8 + u32::from(o - b'0');
                            it.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((v & 0xff) as u8);
            }
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn build_diff_set(
    entries: Vec<RawEntry>,
    patches: &mut HashMap<String, FilePatch>,
    filter: &DiffFilter,
) -> DiffSet {
    let mut set = DiffSet::new();
    for entry in entries {
        if !filter.admits(&entry.path) {
            continue;
        }
        let status = match entry.status {
            'A' | 'C' => FileStatus::Added,
            'D' => FileStatus::Removed,
            'R' => FileStatus::Renamed,
            _ if entry.old_blob == entry.new_blob && entry.old_mode != entry.new_mode => {
                FileStatus::PermissionChanged
            }
            _ => FileStatus::Modified,
        };
        let admitted = match status {
            FileStatus::Removed => filter.include_removed,
            FileStatus::PermissionChanged => filter.include_permission_changes,
            _ => true,
        };
        if !admitted {
            continue;
        }
        let mut record = DiffRecord::new(entry.path.clone(), status);
        record.old_path = entry.old_path;
        // A rename is flagged on its own; its content diff only when asked for.
        let wants_patch = match status {
            FileStatus::Renamed => filter.include_renamed,
            FileStatus::PermissionChanged => false,
            _ => true,
        };
        if wants_patch {
            if let Some(fp) = patches.remove(&entry.path) {
                if status != FileStatus::Removed {
                    record.changed_lines = fp.lines;
                }
                record.patch = Some(fp.text);
            }
        }
        set.insert(entry.path, record);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::{commit, git, git_available, init};
    use crate::process::ProcessRunner;
    use std::time::Duration;

    fn lines(v: &[usize]) -> BTreeSet<usize> {
        v.iter().copied().collect()
    }

    #[test]
    fn test_parse_raw_nul_records() {
        let raw = ":100644 100755 aaa aaa M\0bin/run.sh\0\
                   :100644 100644 aaa bbb R087\0old/x.py\0new dir/x.py\0\
                   :100644 100644 ccc ddd M\0tab\there.py\0";
        let entries = parse_raw(raw);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].status, 'M');
        assert_eq!(entries[0].path, "bin/run.sh");
        assert_ne!(entries[0].old_mode, entries[0].new_mode);
        assert_eq!(entries[1].status, 'R');
        assert_eq!(entries[1].old_path.as_deref(), Some("old/x.py"));
        assert_eq!(entries[1].path, "new dir/x.py");
        assert_eq!(entries[2].path, "tab\there.py");
        assert!(parse_raw("").is_empty());
    }

    #[test]
    fn test_header_paths_with_spaces_and_quoting() {
        assert_eq!(header_path("b/my file.py\t", "b/").as_deref(), Some("my file.py"));
        assert_eq!(header_path("a/plain.py", "a/").as_deref(), Some("plain.py"));
        assert_eq!(header_path("/dev/null", "a/"), None);
        assert_eq!(
            header_path("\"b/we\\\"ird\\tname.py\"", "b/").as_deref(),
            Some("we\"ird\tname.py")
        );
        // Octal escapes are raw bytes of a UTF-8 name.
        assert_eq!(unquote("\"caf\\303\\251.py\""), "café.py");
        assert_eq!(
            git_line_path("diff --git a/my file.py b/my file.py").as_deref(),
            Some("my file.py")
        );
        assert_eq!(
            git_line_path("diff --git \"a/x\\\"y.sh\" \"b/x\\\"y.sh\"").as_deref(),
            Some("x\"y.sh")
        );
    }

    #[test]
    fn test_split_patches_reads_hunk_ranges() {
        let patch = "\
diff --git a/a.py b/a.py
index 111..222 100644
--- a/a.py
+++ b/a.py
@@ -2 +2,2 @@ def f():
-    return 1
+    x = 2
+    return x
@@ -10,0 +12 @@
+# trailing
@@ -20,3 +22,0 @@
--- removed sql comment
-a
-b
diff --git a/gone.py b/gone.py
deleted file mode 100644
--- a/gone.py
+++ /dev/null
@@ -1 +0,0 @@
-x
";
        let patches = split_patches(patch, hunk_header().unwrap());
        assert_eq!(patches["a.py"].lines, lines(&[2, 3, 12]));
        assert!(patches["a.py"].text.contains("# trailing"));
        assert!(patches["gone.py"].lines.is_empty());

        let spaced = "\
diff --git a/my file.py b/my file.py
index 111..222 100644
--- a/my file.py\t
+++ b/my file.py\t
@@ -1,0 +2 @@
+BAD
diff --git a/run me.sh b/run me.sh
old mode 100644
new mode 100755
";
        let patches = split_patches(spaced, hunk_header().unwrap());
        assert_eq!(patches["my file.py"].lines, lines(&[2]));
        assert!(patches["run me.sh"].lines.is_empty());
    }

    fn filter() -> DiffFilter {
        DiffFilter {
            file_extensions: ["py".to_string()].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_diff_set_statuses_and_filters() {
        let entries = parse_raw(
            ":100644 100755 aaa aaa M\0mode.py\0\
             :100644 100644 aaa bbb M\0edit.py\0\
             :000000 100644 000 ccc A\0new.py\0\
             :100644 000000 ddd 000 D\0gone.py\0\
             :100644 100644 eee eee R100\0old.py\0moved.py\0\
             :100644 100644 aaa bbb M\0notes.md\0",
        );
        let mut patches = HashMap::new();
        patches.insert(
            "edit.py".to_string(),
            FilePatch {
                lines: lines(&[4]),
                text: "p".into(),
            },
        );
        patches.insert(
            "new.py".to_string(),
            FilePatch {
                lines: lines(&[1, 2]),
                text: "p".into(),
            },
        );
        let set = build_diff_set(entries.clone(), &mut patches.clone(), &filter());
        assert_eq!(
            set.keys().cloned().collect::<Vec<_>>(),
            vec!["edit.py", "moved.py", "new.py"]
        );
        assert_eq!(set["edit.py"].changed_lines, lines(&[4]));
        assert_eq!(set["moved.py"].status, FileStatus::Renamed);
        assert_eq!(set["moved.py"].old_path.as_deref(), Some("old.py"));
        assert!(set["moved.py"].is_auto_approvable());

        let mut all = filter();
        all.include_removed = true;
        all.include_permission_changes = true;
        let set = build_diff_set(entries, &mut patches, &all);
        assert_eq!(set["mode.py"].status, FileStatus::PermissionChanged);
        assert!(set["mode.py"].changed_lines.is_empty());
        assert_eq!(set["gone.py"].status, FileStatus::Removed);
        assert!(!set.contains_key("notes.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_diff_files_against_repository() {
        use std::os::unix::fs::PermissionsExt;

        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        init(dir.path());
        let base = commit(
            dir.path(),
            &[
                ("a.py", "one\ntwo\nthree\n"),
                ("old.py", "keep\nthis\nfile\nas\nis\n"),
                ("run.py", "print()\n"),
                ("my file.py", "a\n"),
                ("we\"ird.py", "x\n"),
            ],
            "base",
        );
        git(dir.path(), &["mv", "old.py", "renamed.py"]);
        std::fs::set_permissions(
            dir.path().join("run.py"),
            std::fs::Permissions::from_mode(0o755),
        )
        .unwrap();
        let head = commit(
            dir.path(),
            &[
                ("a.py", "one\nTWO\nthree\nfour\n"),
                ("b.py", "new\n"),
                ("renamed.py", "keep\nthis\nfile\nas\nis\nmore\n"),
                ("my file.py", "a\nBAD\n"),
                ("we\"ird.py", "x\ny\n"),
            ],
            "head",
        );

        let mut ctx = RunContext::new(ProcessRunner::new(0, Duration::ZERO));
        let repo = Repository::open(&mut ctx, dir.path(), &head).unwrap();
        let mut f = filter();
        f.include_permission_changes = true;
        let set = diff_files(&mut ctx, &repo, &base, &head, &f).unwrap();

        assert_eq!(set["a.py"].status, FileStatus::Modified);
        assert_eq!(set["a.py"].changed_lines, lines(&[2, 4]));
        assert_eq!(set["b.py"].status, FileStatus::Added);
        assert_eq!(set["b.py"].changed_lines, lines(&[1]));
        assert_eq!(set["renamed.py"].status, FileStatus::Renamed);
        assert!(set["renamed.py"].changed_lines.is_empty());
        assert!(set["renamed.py"].patch.is_none());
        assert_eq!(set["run.py"].status, FileStatus::PermissionChanged);
        // Names git would tab-terminate or C-quote in patch headers.
        assert_eq!(set["my file.py"].changed_lines, lines(&[2]));
        assert!(!set["my file.py"].is_auto_approvable());
        assert_eq!(set["we\"ird.py"].changed_lines, lines(&[2]));

        // Asked for, a rename carries its content diff.
        let mut with_renames = f.clone();
        with_renames.include_renamed = true;
        let renamed = diff_files(&mut ctx, &repo, &base, &head, &with_renames).unwrap();
        let record = &renamed["renamed.py"];
        assert_eq!(record.status, FileStatus::Renamed);
        assert_eq!(record.old_path.as_deref(), Some("old.py"));
        assert_eq!(record.changed_lines, lines(&[6]));
        assert!(record.patch.as_deref().unwrap_or("").contains("+more"));

        // Identical call is memoized.
        let misses = ctx.counters.get("cache.miss");
        assert_eq!(diff_files(&mut ctx, &repo, &base, &head, &f).unwrap(), set);
        assert_eq!(ctx.counters.get("cache.miss"), misses);

        assert!(diff_files(&mut ctx, &repo, "no-such-rev", &head, &f).is_err());
    }
}
