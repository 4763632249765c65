//! Space-aware placement: pick the branch a directory consolidates onto.
//!
//! Projection per branch: `free_space - target_size + copy_size`. The
//! branch's own existing copy is already inside its used space, so its size
//! is added back rather than charged twice. A branch is feasible when the
//! projection stays above the configured floor.
//!
//! Selection runs in two passes: existing-copy branches first, then (only if
//! none fits) branches that would need a fresh directory. Within a pass the
//! smallest feasible projection wins — the tightest fit keeps slack on the
//! other branches. Ties keep the earliest branch, i.e. branch priority order.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::mount::{Mount, is_mountpoint};
use crate::ops::size::tree_size;
use crate::ops::space::free_space_bytes;

/// One branch's situation for a given target directory.
#[derive(Debug, Clone)]
pub struct BranchCandidate {
    pub branch: PathBuf,
    /// Candidate location of the target on this branch.
    pub path: PathBuf,
    /// Bytes available on the branch's filesystem.
    pub free_space: u64,
    /// True when `path` is a real directory: not a symlink, not a mount.
    pub has_copy: bool,
    /// Subtree size of the existing copy; 0 when absent.
    pub copy_size: u64,
}

/// A consolidation decision. `index` refers into the surveyed candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub index: usize,
    /// The chosen branch holds no copy yet; its directory must be created.
    pub needs_create: bool,
    /// Free space the chosen branch is projected to keep after the move.
    pub projected_free: u64,
}

/// Survey every branch of the pool for `relative`: free space, whether a
/// directory copy exists there, and how large it is.
pub fn survey(mount: &Mount<'_>, relative: &Path) -> Result<Vec<BranchCandidate>> {
    let mut candidates = Vec::with_capacity(mount.branches.len());
    for branch in mount.branches {
        let path = branch.join(relative);
        let free_space = free_space_bytes(branch)
            .with_context(|| format!("query free space of branch '{}'", branch.display()))?;
        let has_copy = match fs::symlink_metadata(&path) {
            Ok(meta) => meta.is_dir() && !is_mountpoint(&path)?,
            Err(_) => false,
        };
        let copy_size = if has_copy { tree_size(&path)? } else { 0 };
        debug!(
            branch = %branch.display(),
            free = free_space,
            has_copy,
            copy_size,
            "branch surveyed"
        );
        candidates.push(BranchCandidate {
            branch: branch.clone(),
            path,
            free_space,
            has_copy,
            copy_size,
        });
    }
    Ok(candidates)
}

fn projected(candidate: &BranchCandidate, target_size: u64) -> i128 {
    candidate.free_space as i128 - target_size as i128 + candidate.copy_size as i128
}

fn tightest_fit(
    candidates: &[BranchCandidate],
    target_size: u64,
    min_free: u64,
    want_copy: bool,
) -> Option<(usize, i128)> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.has_copy == want_copy)
        .map(|(i, c)| (i, projected(c, target_size)))
        .filter(|(_, p)| *p > min_free as i128)
        .min_by_key(|&(_, p)| p)
}

/// Choose the consolidation branch, or `None` when no branch can take the
/// whole target without dropping below `min_free`.
pub fn choose_branch(
    candidates: &[BranchCandidate],
    target_size: u64,
    min_free: u64,
) -> Option<Placement> {
    if let Some((index, projected)) = tightest_fit(candidates, target_size, min_free, true) {
        return Some(Placement {
            index,
            needs_create: false,
            projected_free: projected as u64,
        });
    }
    tightest_fit(candidates, target_size, min_free, false).map(|(index, projected)| Placement {
        index,
        needs_create: true,
        projected_free: projected as u64,
    })
}
