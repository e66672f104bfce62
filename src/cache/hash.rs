// src/cache/hash.rs

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, warn};

use crate::fs::FileSystem;

const CHUNK_SIZE: usize = 8192;

fn update_from_file(fs: &dyn FileSystem, hasher: &mut Hasher, path: &Path) -> Result<()> {
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

/// Content digest of a task: the concatenated bytes of its input files and
/// its definition file, taken in lexicographic path order.
///
/// Paths that do not exist (or are not regular files) are skipped, so an
/// input still to be produced by an upstream task does not fail hashing.
/// Files that exist but cannot be read are skipped too.
pub fn compute_task_hash(
    fs: &dyn FileSystem,
    inputs: &[PathBuf],
    definition_file: &Path,
) -> Result<String> {
    let mut paths: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
    paths.push(definition_file);
    paths.sort();
    paths.dedup();

    let mut hasher = Hasher::new();
    for path in paths {
        if !fs.is_file(path) {
            debug!("skipping missing input {:?}", path);
            continue;
        }
        let checkpoint = hasher.clone();
        if let Err(err) = update_from_file(fs, &mut hasher, path) {
            warn!(error = %format!("{err:#}"), "skipping unreadable input {:?}", path);
            hasher = checkpoint;
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, "computed task hash");
    Ok(hash)
}
