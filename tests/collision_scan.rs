mod common;

use common::pool_with_branches;
use mergepool::mount::{Mount, resolve};
use mergepool::ops::scan::{branch_copies, scan_collisions};
use std::fs;

#[test]
fn resolve_returns_one_candidate_per_branch() -> Result<(), Box<dyn std::error::Error>> {
    let pool = pool_with_branches(3);
    let mount = Mount {
        mountpoint: &pool.mountpoint,
        branches: &pool.branches,
    };
    let target = pool.mountpoint.join("media/show");
    let resolved = resolve(&mount, &target)?;
    assert_eq!(resolved.candidates.len(), 3);
    for (candidate, branch) in resolved.candidates.iter().zip(&pool.branches) {
        assert_eq!(candidate.path, branch.join("media/show"));
    }
    Ok(())
}

#[test]
fn file_on_two_branches_yields_one_group() -> Result<(), Box<dyn std::error::Error>> {
    let pool = pool_with_branches(3);
    pool.seed("media/ep1.mkv", b"episode", &[0, 1]);
    let mount = Mount {
        mountpoint: &pool.mountpoint,
        branches: &pool.branches,
    };

    let groups = scan_collisions(&pool.mountpoint, &mount)?;
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0],
        vec![
            pool.branches[0].join("media/ep1.mkv"),
            pool.branches[1].join("media/ep1.mkv"),
        ]
    );
    Ok(())
}

#[test]
fn file_on_one_branch_yields_no_group() -> Result<(), Box<dyn std::error::Error>> {
    let pool = pool_with_branches(3);
    pool.seed("media/ep2.mkv", b"episode", &[2]);
    let mount = Mount {
        mountpoint: &pool.mountpoint,
        branches: &pool.branches,
    };
    assert!(scan_collisions(&pool.mountpoint, &mount)?.is_empty());
    Ok(())
}

#[test]
fn scan_ignores_symlinked_files() -> Result<(), Box<dyn std::error::Error>> {
    let pool = pool_with_branches(2);
    pool.seed("real.bin", b"data", &[0, 1]);
    // A symlink in the merged view must not become a collision subject.
    std::os::unix::fs::symlink(
        pool.mountpoint.join("real.bin"),
        pool.mountpoint.join("alias.bin"),
    )?;
    let mount = Mount {
        mountpoint: &pool.mountpoint,
        branches: &pool.branches,
    };
    let groups = scan_collisions(&pool.mountpoint, &mount)?;
    assert_eq!(groups.len(), 1, "only the real file groups");
    assert!(groups[0].iter().all(|p| p.ends_with("real.bin")));
    Ok(())
}

#[test]
fn branch_copies_reports_all_existing_candidates() -> Result<(), Box<dyn std::error::Error>> {
    let pool = pool_with_branches(4);
    pool.seed("docs/readme", b"text", &[1, 3]);
    let mount = Mount {
        mountpoint: &pool.mountpoint,
        branches: &pool.branches,
    };
    let copies = branch_copies(&mount, &pool.mountpoint.join("docs/readme"))?;
    assert_eq!(
        copies,
        vec![
            pool.branches[1].join("docs/readme"),
            pool.branches[3].join("docs/readme"),
        ]
    );
    Ok(())
}

#[test]
fn scan_aborts_on_unreadable_subtree() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::fs::PermissionsExt;
    if unsafe { libc::geteuid() } == 0 {
        // root ignores permission bits; nothing to observe
        return Ok(());
    }
    let pool = pool_with_branches(2);
    pool.seed("locked/file", b"x", &[0]);
    let locked = pool.mountpoint.join("locked");
    let mut perms = fs::metadata(&locked)?.permissions();
    perms.set_mode(0o000);
    fs::set_permissions(&locked, perms)?;

    let mount = Mount {
        mountpoint: &pool.mountpoint,
        branches: &pool.branches,
    };
    let result = scan_collisions(&pool.mountpoint, &mount);

    // Restore so the tempdir can be cleaned up.
    let mut perms = fs::metadata(&locked)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&locked, perms)?;

    assert!(result.is_err(), "permission errors must not be swallowed");
    Ok(())
}
