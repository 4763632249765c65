//! Subtree sizing.
//! Sums regular-file sizes only: symlinks are never followed or counted, and
//! the walk never crosses into nested mounts (their bytes belong to another
//! filesystem and must not be double-counted). Placement decisions depend on
//! these totals, so I/O errors propagate instead of being papered over.

use anyhow::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

/// Total bytes of regular files under `dir`. Recomputed per call; no caching.
pub fn tree_size(dir: &Path) -> Result<u64> {
    let mut total: u64 = 0;
    for entry in WalkDir::new(dir).min_depth(1).same_file_system(true) {
        let entry = entry.with_context(|| format!("walk '{}'", dir.display()))?;
        if entry.file_type().is_file() {
            let meta = entry
                .metadata()
                .with_context(|| format!("stat '{}'", entry.path().display()))?;
            total = total.saturating_add(meta.len());
        }
    }
    Ok(total)
}
