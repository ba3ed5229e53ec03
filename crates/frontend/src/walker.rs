//! Repo traversal: collect the JavaScript/TypeScript source set.

use crate::languages::Language;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory names never descended into.
const SKIP_DIRS: &[&str] = &["node_modules", "dist", "build", "out", "coverage"];

/// Collect all parseable source files under `root`, sorted by their
/// repo-relative path so downstream indexing sees a canonical order.
///
/// Returns `(absolute_path, repo_relative_path)` pairs; relative paths are
/// `/`-separated regardless of platform.
pub fn collect_files(root: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
    {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if Language::from_extension(ext).is_none() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("relativizing {}", entry.path().display()))?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), rel));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    debug!(count = files.len(), "collected source files");
    Ok(files)
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    // The walk root is always entered, whatever its name.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    (name.starts_with('.') && name.len() > 1) || SKIP_DIRS.contains(&name.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collects_sorted_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/b.ts"), "export {}").unwrap();
        fs::write(root.join("src/a.js"), "// a").unwrap();
        fs::write(root.join("node_modules/pkg/x.js"), "// dep").unwrap();
        fs::write(root.join(".git/hook.js"), "// hook").unwrap();
        fs::write(root.join("readme.md"), "# doc").unwrap();

        let files = collect_files(root).unwrap();
        let rels: Vec<&str> = files.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(rels, vec!["src/a.js", "src/b.ts"]);
    }
}
