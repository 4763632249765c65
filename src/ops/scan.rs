//! Collision scanning: find logical paths that exist on more than one branch.
//!
//! Only leaf files are collision subjects; directories are expected to exist
//! on several branches (that is how pooling spreads a tree) and only files
//! can be content-compared and deduplicated.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

use crate::mount::{Mount, resolve};

/// Branch-local paths that all map to the same mountpoint-relative path and
/// all currently exist. Order follows branch priority.
pub type CollisionGroup = Vec<PathBuf>;

/// Existing branch copies of one logical path, in branch priority order.
pub fn branch_copies(mount: &Mount<'_>, abs: &Path) -> Result<Vec<PathBuf>> {
    let resolved = resolve(mount, abs)?;
    Ok(resolved
        .candidates
        .into_iter()
        .map(|c| c.path)
        .filter(|p| p.exists())
        .collect())
}

/// Walk every regular, non-symlink file under `root` and report each one that
/// exists on two or more branches of `mount`. The walk stays on `root`'s
/// filesystem; nested mounts belong to other pools (or none) and are not
/// scanned here.
pub fn scan_collisions(root: &Path, mount: &Mount<'_>) -> Result<Vec<CollisionGroup>> {
    let mut groups = Vec::new();
    for entry in WalkDir::new(root).same_file_system(true) {
        let entry = entry.with_context(|| format!("walk '{}'", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let copies = branch_copies(mount, entry.path())?;
        if copies.len() > 1 {
            trace!(path = %entry.path().display(), copies = copies.len(), "collision");
            groups.push(copies);
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Pool fixture: a "mountpoint" directory plus N branch directories,
    /// all on the test filesystem.
    fn pool(branches: usize) -> (tempfile::TempDir, Vec<PathBuf>) {
        let td = tempfile::tempdir().unwrap();
        let mut dirs = Vec::new();
        for i in 0..branches {
            let b = td.path().join(format!("branch{}", i));
            fs::create_dir(&b).unwrap();
            dirs.push(b);
        }
        (td, dirs)
    }

    #[test]
    fn duplicate_file_forms_one_group() {
        let (td, branches) = pool(3);
        let point = td.path().join("pool");
        fs::create_dir(&point).unwrap();
        // Logical file media/x on branches 0 and 1 plus the merged view.
        for dir in [&point, &branches[0], &branches[1]] {
            fs::create_dir_all(dir.join("media")).unwrap();
            fs::write(dir.join("media/x"), b"payload").unwrap();
        }
        let mount = Mount {
            mountpoint: &point,
            branches: &branches,
        };
        let groups = scan_collisions(&point, &mount).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0],
            vec![branches[0].join("media/x"), branches[1].join("media/x")]
        );
    }

    #[test]
    fn single_copy_produces_no_group() {
        let (td, branches) = pool(3);
        let point = td.path().join("pool");
        fs::create_dir(&point).unwrap();
        for dir in [&point, &branches[2]] {
            fs::create_dir_all(dir.join("media")).unwrap();
            fs::write(dir.join("media/solo"), b"payload").unwrap();
        }
        let mount = Mount {
            mountpoint: &point,
            branches: &branches,
        };
        assert!(scan_collisions(&point, &mount).unwrap().is_empty());
    }

    #[test]
    fn directories_are_not_collision_subjects() {
        let (td, branches) = pool(2);
        let point = td.path().join("pool");
        fs::create_dir(&point).unwrap();
        for dir in [&point, &branches[0], &branches[1]] {
            fs::create_dir_all(dir.join("shared/dir")).unwrap();
        }
        let mount = Mount {
            mountpoint: &point,
            branches: &branches,
        };
        assert!(scan_collisions(&point, &mount).unwrap().is_empty());
    }

    #[test]
    fn branch_copies_checks_every_branch_not_just_walked_ones() {
        let (td, branches) = pool(3);
        let point = td.path().join("pool");
        fs::create_dir(&point).unwrap();
        fs::write(point.join("f"), b"x").unwrap();
        fs::write(branches[0].join("f"), b"x").unwrap();
        fs::write(branches[2].join("f"), b"x").unwrap();
        let mount = Mount {
            mountpoint: &point,
            branches: &branches,
        };
        let copies = branch_copies(&mount, &point.join("f")).unwrap();
        assert_eq!(copies, vec![branches[0].join("f"), branches[2].join("f")]);
    }
}
