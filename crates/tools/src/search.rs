// # -----------------------------
// # crates/tools/src/search.rs
// # -----------------------------
use std::ops::Range;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Bounds for a single service walk.
#[derive(Debug, Clone)]
pub struct WalkLimits {
    pub max_depth: usize,
    pub max_files: usize,
    pub ignore_dirs: Vec<String>,
    pub include_hidden: bool,
}

/// Result of one service walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Walk {
    /// Relative to the walk root, `/`-separated.
    pub files: Vec<String>,
    /// Set only when a matching file was left out because of `max_files`.
    pub capped: bool,
}

/// Lowercases and dot-prefixes extension filters; `["ts", ".JS"]` becomes `[".ts", ".js"]`.
pub fn normalize_exts(types: &[String]) -> Vec<String> {
    types
        .iter()
        .map(|t| t.trim().trim_start_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| format!(".{t}"))
        .collect()
}

fn has_ext(path: &Path, exts: &[String]) -> bool {
    match path.extension() {
        Some(e) => {
            let e = format!(".{}", e.to_string_lossy().to_lowercase());
            exts.iter().any(|x| *x == e)
        }
        None => false,
    }
}

/// Regular files under `root` whose extension is in `exts`, in name order,
/// at most `limits.max_files`. Symlinks are never followed or returned and
/// unreadable entries are skipped. Blocking: run it off the async runtime.
pub fn collect_candidates(root: &Path, exts: &[String], limits: &WalkLimits) -> Walk {
    let keep = |e: &DirEntry| {
        if e.depth() == 0 {
            return true;
        }
        let name = e.file_name().to_string_lossy();
        if !limits.include_hidden && name.starts_with('.') {
            return false;
        }
        !(e.file_type().is_dir() && limits.ignore_dirs.iter().any(|d| *d == name))
    };

    let mut out = Walk::default();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .max_depth(limits.max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(keep)
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::trace!(error = %e, "walk entry skipped");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_ext(entry.path(), exts) {
            continue;
        }
        if out.files.len() >= limits.max_files {
            tracing::debug!(root = %root.display(), cap = limits.max_files, "walk capped");
            out.capped = true;
            break;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        out.files.push(rel);
    }
    out
}

/// A line containing the needle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineHit {
    /// 1-based.
    pub line: usize,
    /// Byte range of the line in the scanned text, without the terminator.
    pub span: Range<usize>,
}

/// Case-insensitive substring scan, line by line, stopping after `limit` hits.
pub fn scan_lines(text: &str, needle: &str, limit: usize) -> Vec<LineHit> {
    let needle = needle.to_lowercase();
    let mut hits = Vec::new();
    if needle.is_empty() || limit == 0 {
        return hits;
    }
    let mut offset = 0;
    for (idx, raw) in text.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);
        if line.to_lowercase().contains(&needle) {
            hits.push(LineHit {
                line: idx + 1,
                span: start..start + line.len(),
            });
            if hits.len() == limit {
                break;
            }
        }
    }
    hits
}

/// Trimmed line clipped to `max_chars` characters.
pub fn snippet(line: &str, max_chars: usize) -> String {
    line.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn limits() -> WalkLimits {
        WalkLimits {
            max_depth: 8,
            max_files: 100,
            ignore_dirs: vec!["node_modules".into(), "target".into()],
            include_hidden: false,
        }
    }

    #[test]
    fn walk_filters_ignored_hidden_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("src/a.ts"), "").unwrap();
        fs::write(root.join("src/nested/b.JS"), "").unwrap();
        fs::write(root.join("src/readme.md"), "").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();
        fs::write(root.join(".cache/c.js"), "").unwrap();
        fs::write(root.join(".hidden.ts"), "").unwrap();

        let exts = normalize_exts(&["ts".into(), ".js".into()]);
        let walk = collect_candidates(root, &exts, &limits());
        assert_eq!(walk.files, ["src/a.ts", "src/nested/b.JS"]);
        assert!(!walk.capped);
    }

    #[test]
    fn walk_respects_depth_and_file_cap() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("top.py"), "").unwrap();
        fs::write(root.join("a/b/c/deep.py"), "").unwrap();
        for i in 0..5 {
            fs::write(root.join(format!("a/f{i}.py")), "").unwrap();
        }
        let exts = normalize_exts(&["py".into()]);

        let shallow = WalkLimits { max_depth: 2, ..limits() };
        let found = collect_candidates(root, &exts, &shallow);
        assert!(found.files.iter().all(|f| f != "a/b/c/deep.py"));
        assert_eq!(found.files.len(), 6);

        let capped = WalkLimits { max_files: 3, ..limits() };
        let walk = collect_candidates(root, &exts, &capped);
        assert_eq!(walk.files.len(), 3);
        assert!(walk.capped);
    }

    #[test]
    fn cap_equal_to_matches_is_not_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.rs"), "").unwrap();
        fs::write(root.join("b.rs"), "").unwrap();
        // non-matching entries after the last match must not flag the walk
        fs::write(root.join("c.txt"), "").unwrap();
        fs::create_dir_all(root.join("d")).unwrap();
        let exts = normalize_exts(&["rs".into()]);

        let exact = WalkLimits { max_files: 2, ..limits() };
        let walk = collect_candidates(root, &exts, &exact);
        assert_eq!(walk.files, ["a.rs", "b.rs"]);
        assert!(!walk.capped);

        let none = WalkLimits { max_files: 0, ..limits() };
        let walk = collect_candidates(root, &exts, &none);
        assert!(walk.files.is_empty());
        assert!(walk.capped);
    }

    #[cfg(unix)]
    #[test]
    fn walk_skips_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("leak.js"), "").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("leak.js"), dir.path().join("l.js"))
            .unwrap();
        let exts = normalize_exts(&["js".into()]);
        assert!(collect_candidates(dir.path(), &exts, &limits()).files.is_empty());
    }

    #[test]
    fn scan_is_case_insensitive_and_bounded() {
        let text = "first\nconst TOKEN = 1;\r\nnothing\nlet token2;\n";
        let hits = scan_lines(text, "Token", 10);
        assert_eq!(hits.iter().map(|h| h.line).collect::<Vec<_>>(), [2, 4]);
        assert_eq!(&text[hits[0].span.clone()], "const TOKEN = 1;");
        assert_eq!(scan_lines(text, "token", 1).len(), 1);
        assert!(scan_lines(text, "", 10).is_empty());
    }

    #[test]
    fn snippet_trims_and_clips() {
        assert_eq!(snippet("   hello  ", 200), "hello");
        assert_eq!(snippet(&"é".repeat(300), 200).chars().count(), 200);
    }
}
