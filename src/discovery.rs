use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub is_dir: bool,
}

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy().to_string()
}

fn walk(root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .build()
        .filter_map(Result::ok)
        .map(|d| d.into_path())
        .filter(move |p| p != root)
}

pub fn list_files(root: &Path, max: usize) -> Vec<FileEntry> {
    walk(root)
        .take(max)
        .map(|p| FileEntry { path: relative_display(root, &p), is_dir: p.is_dir() })
        .collect()
}

pub fn search_files(root: &Path, pattern: &str, max: usize) -> anyhow::Result<Vec<FileEntry>> {
    let re = Regex::new(pattern)?;
    Ok(walk(root)
        .filter_map(|p| {
            let rel = relative_display(root, &p);
            re.is_match(&rel).then(|| FileEntry { path: rel, is_dir: p.is_dir() })
        })
        .take(max)
        .collect())
}

/// Resolves `rel` against `root`, refusing anything that escapes it (including via symlinks).
pub fn resolve_under_root(root: &Path, rel: &str) -> Option<PathBuf> {
    let root_abs = root.canonicalize().ok()?;
    let rel_path = Path::new(rel);
    let rel_path = rel_path.strip_prefix("/").unwrap_or(rel_path);
    let mut normalized = PathBuf::new();
    for comp in rel_path.components() {
        match comp {
            Component::ParentDir => {
                if !normalized.pop() { return None; }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::Normal(part) => normalized.push(part),
        }
    }
    let full_path = root_abs.join(&normalized);
    // The deepest entry that exists, dangling links included, decides containment.
    let existing = full_path.ancestors().find(|p| fs::symlink_metadata(p).is_ok())?;
    let canonical = existing.canonicalize().ok()?;
    if !canonical.starts_with(&root_abs) {
        return None;
    }
    if existing == full_path.as_path() { Some(canonical) } else { Some(full_path) }
}

pub fn read_file_under_root(root: &Path, rel: &str, max_bytes: usize) -> anyhow::Result<String> {
    let path = resolve_under_root(root, rel).ok_or_else(|| anyhow::anyhow!("path outside workspace: {rel}"))?;
    if !fs::metadata(&path)?.is_file() {
        anyhow::bail!("not a file: {rel}");
    }
    let mut bytes = Vec::new();
    fs::File::open(&path)?.take(max_bytes as u64).read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_denies_path_traversal() {
        let dir = tempdir().unwrap();
        assert!(resolve_under_root(dir.path(), "../etc/passwd").is_none());
        assert!(resolve_under_root(dir.path(), "a/../../b").is_none());
        assert!(resolve_under_root(dir.path(), "new/dir/file.txt").is_some());
    }

    #[test]
    fn absolute_looking_paths_stay_inside_root() {
        let dir = tempdir().unwrap();
        let got = resolve_under_root(dir.path(), "/notes.md").unwrap();
        assert!(got.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_refuses_links_leaving_root() {
        let ws = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("missing.txt"), ws.path().join("dangling")).unwrap();
        std::os::unix::fs::symlink(outside.path(), ws.path().join("out")).unwrap();
        std::os::unix::fs::symlink(ws.path().join("notes"), ws.path().join("inner")).unwrap();
        fs::create_dir_all(ws.path().join("notes")).unwrap();

        assert!(resolve_under_root(ws.path(), "dangling").is_none());
        assert!(resolve_under_root(ws.path(), "dangling/child.txt").is_none());
        assert!(resolve_under_root(ws.path(), "out/new.txt").is_none());
        assert!(resolve_under_root(ws.path(), "inner/new.txt").is_some());
    }

    #[test]
    fn read_file_respects_limit() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello world\n").unwrap();
        let content = read_file_under_root(dir.path(), "a.txt", 5).unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn list_and_search_report_relative_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/todo.md"), "x").unwrap();
        fs::write(dir.path().join("readme.txt"), "y").unwrap();

        let listed = list_files(dir.path(), 10);
        assert!(listed.iter().any(|e| e.path == "notes" && e.is_dir));
        assert!(listed.iter().any(|e| e.path.ends_with("todo.md") && !e.is_dir));

        let found = search_files(dir.path(), r"\.md$", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert!(search_files(dir.path(), "(", 10).is_err());
    }
}
