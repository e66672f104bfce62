// src/task/sources.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Resolve `patterns` against `base`.
///
/// Plain paths are kept as given, even if they do not exist yet, so that a
/// missing source can be reported before the task runs. Glob patterns are
/// expanded by walking `base`; directories in `skip` and hidden directories
/// are not searched. The result is sorted and free of duplicates.
pub fn resolve_sources(
    fs: &dyn FileSystem,
    base: &Path,
    patterns: &[String],
    skip: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = patterns
        .iter()
        .filter(|p| !is_glob(p))
        .map(|p| base.join(p))
        .collect();

    let globs: Vec<&str> = patterns
        .iter()
        .map(String::as_str)
        .filter(|p| is_glob(p))
        .collect();

    if !globs.is_empty() && fs.is_dir(base) {
        let set = build_globset(&globs)?;
        let mut stack = vec![base.to_path_buf()];

        while let Some(dir) = stack.pop() {
            for path in fs.read_dir(&dir)? {
                if fs.is_dir(&path) {
                    let hidden = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with('.'));
                    if !hidden && !skip.contains(&path) {
                        stack.push(path);
                    }
                } else if fs.is_file(&path) {
                    if let Ok(rel) = path.strip_prefix(base) {
                        let rel_str = rel.to_string_lossy().replace('\\', "/");
                        if set.is_match(&rel_str) {
                            files.push(path);
                        }
                    }
                }
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
