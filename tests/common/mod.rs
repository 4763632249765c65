//! Shared fixture helpers for pool-shaped test trees.
//!
//! A "pool" here is a mountpoint directory plus N branch directories living
//! on the test filesystem; tests build `Mount` views over them directly, the
//! way the app does after topology discovery.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct PoolFixture {
    pub root: TempDir,
    pub mountpoint: PathBuf,
    pub branches: Vec<PathBuf>,
}

pub fn pool_with_branches(n: usize) -> PoolFixture {
    let root = tempfile::tempdir().expect("create pool tempdir");
    let mountpoint = root.path().join("pool");
    fs::create_dir(&mountpoint).expect("create mountpoint dir");
    let branches = (0..n)
        .map(|i| {
            let b = root.path().join(format!("branch{}", i));
            fs::create_dir(&b).expect("create branch dir");
            b
        })
        .collect();
    PoolFixture {
        root,
        mountpoint,
        branches,
    }
}

impl PoolFixture {
    /// Write `contents` at `rel` below the merged view and the given branches.
    pub fn seed(&self, rel: &str, contents: &[u8], branch_indices: &[usize]) {
        let mut dirs = vec![self.mountpoint.clone()];
        dirs.extend(branch_indices.iter().map(|&i| self.branches[i].clone()));
        for dir in dirs {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent dirs");
            }
            fs::write(&path, contents).expect("seed file");
        }
    }
}
