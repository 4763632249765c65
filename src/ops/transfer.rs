//! Consolidation transfer.
//!
//! Bulk data movement is delegated to external tools with well-defined
//! semantics:
//! - `rsync -a -P -x --ignore-existing --remove-source-files` copies a branch
//!   subtree into the chosen branch's parent, preserving attributes, staying
//!   on one filesystem, skipping files the destination already has, and
//!   removing sources it copied.
//! - `find <dir> -type d -empty -delete` prunes the directories the move
//!   emptied.
//!
//! Dry-run uses rsync's own trial mode (`-i --dry-run`) and lists empty
//! directories without `-delete`.
//!
//! Each branch's move is an independent unit: a non-zero exit is logged with
//! its status and the remaining branches still proceed.

use anyhow::{Context, Result, anyhow};
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{error, info};

use crate::errors::PoolError;
use crate::ops::plan::{BranchCandidate, Placement};
use crate::output as out;

pub const MOVE_TOOL: &str = "rsync";
pub const PRUNE_TOOL: &str = "find";

/// Argument vector for the move tool.
pub fn move_args(source: &Path, dest_parent: &Path, dry_run: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-a", "-P", "-x", "--ignore-existing", "--remove-source-files"]
        .iter()
        .map(OsString::from)
        .collect();
    if dry_run {
        args.push(OsString::from("-i"));
        args.push(OsString::from("--dry-run"));
    }
    args.push(source.as_os_str().to_os_string());
    args.push(dir_with_trailing_slash(dest_parent));
    args
}

/// Argument vector for the prune tool. Without `-delete` the tool only lists.
pub fn prune_args(dir: &Path, dry_run: bool) -> Vec<OsString> {
    let mut args = vec![
        dir.as_os_str().to_os_string(),
        OsString::from("-type"),
        OsString::from("d"),
        OsString::from("-empty"),
    ];
    if !dry_run {
        args.push(OsString::from("-delete"));
    }
    args
}

/// rsync treats `dest/` as "into this directory"; make that explicit.
fn dir_with_trailing_slash(dir: &Path) -> OsString {
    let mut s = dir.as_os_str().to_os_string();
    s.push("/");
    s
}

fn run_tool(tool: &'static str, args: &[OsString], subject: &Path) -> Result<()> {
    let status = Command::new(tool)
        .args(args)
        .status()
        .with_context(|| format!("spawn {}", tool))?;
    if !status.success() {
        return Err(PoolError::ExternalTool {
            tool,
            status: status.code().unwrap_or(-1),
            path: subject.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

/// Move every other branch's copy of the target into the chosen branch, then
/// prune the directories the moves emptied. Failures are contained per
/// branch.
pub fn consolidate(
    candidates: &[BranchCandidate],
    placement: Placement,
    dry_run: bool,
) -> Result<()> {
    let chosen = &candidates[placement.index];
    let dest_parent = chosen
        .path
        .parent()
        .ok_or_else(|| anyhow!("chosen branch path '{}' has no parent", chosen.path.display()))?;

    if placement.needs_create {
        if dry_run {
            out::print_info(&format!(
                "No space in existing branches; would create new branch directory {}",
                chosen.path.display()
            ));
        } else {
            out::print_info(&format!(
                "No space in existing branches; creating new branch directory {}",
                chosen.path.display()
            ));
            fs::create_dir_all(&chosen.path)
                .with_context(|| format!("create '{}'", chosen.path.display()))?;
        }
    }

    let trial = if dry_run { " (dry run)" } else { "" };
    for candidate in candidates {
        if !candidate.has_copy || candidate.branch == chosen.branch {
            continue;
        }
        out::print_user(&format!(
            "Moving{}... {} -> {}/",
            trial,
            candidate.path.display(),
            dest_parent.display()
        ));
        if let Err(e) = run_tool(MOVE_TOOL, &move_args(&candidate.path, dest_parent, dry_run), &candidate.path) {
            log_tool_failure(&e, &candidate.path);
            continue;
        }
        out::print_user(&format!(
            "Deleting empty folders{}... {}",
            trial,
            candidate.path.display()
        ));
        if let Err(e) = run_tool(PRUNE_TOOL, &prune_args(&candidate.path, dry_run), &candidate.path) {
            log_tool_failure(&e, &candidate.path);
        }
    }
    Ok(())
}

fn log_tool_failure(e: &anyhow::Error, path: &Path) {
    if let Some(pe) = e.downcast_ref::<PoolError>() {
        error!(code = pe.code(), path = %path.display(), error = %pe, "external tool failed; branch abandoned");
    } else {
        error!(path = %path.display(), error = %e, "external tool failed; branch abandoned");
    }
    out::print_error(&format!("{} (branch left as-is)", e));
    info!(path = %path.display(), "continuing with remaining branches");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_args_real_run() {
        let args = move_args(Path::new("/b1/tv/show"), Path::new("/b2/tv"), false);
        let strs: Vec<_> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            strs,
            vec![
                "-a",
                "-P",
                "-x",
                "--ignore-existing",
                "--remove-source-files",
                "/b1/tv/show",
                "/b2/tv/",
            ]
        );
    }

    #[test]
    fn move_args_dry_run_uses_rsync_trial_mode() {
        let args = move_args(Path::new("/b1/x"), Path::new("/b2"), true);
        let strs: Vec<_> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert!(strs.contains(&"--dry-run".to_string()));
        assert!(strs.contains(&"-i".to_string()));
        assert_eq!(strs.last().unwrap(), "/b2/");
    }

    #[test]
    fn prune_args_only_delete_outside_dry_run() {
        let wet = prune_args(Path::new("/b1/x"), false);
        assert_eq!(wet.last().unwrap(), &OsString::from("-delete"));
        let dry = prune_args(Path::new("/b1/x"), true);
        assert!(!dry.contains(&OsString::from("-delete")));
        assert_eq!(dry[0], OsString::from("/b1/x"));
    }

    #[test]
    fn consolidate_needs_create_is_inert_under_dry_run() {
        // No branches hold copies, so no tools run; the chosen directory
        // must not appear under dry-run.
        let td = tempfile::tempdir().unwrap();
        let chosen = td.path().join("branch0/target");
        let candidates = vec![BranchCandidate {
            branch: td.path().join("branch0"),
            path: chosen.clone(),
            free_space: 1_000_000,
            has_copy: false,
            copy_size: 0,
        }];
        let placement = Placement {
            index: 0,
            needs_create: true,
            projected_free: 1_000_000,
        };
        consolidate(&candidates, placement, true).unwrap();
        assert!(!chosen.exists());
        consolidate(&candidates, placement, false).unwrap();
        assert!(chosen.is_dir());
    }
}
