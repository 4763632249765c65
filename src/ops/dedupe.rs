//! Collision resolution policies.
//!
//! - Abort: any collision skips the whole target (handled by the caller).
//! - Ignore: collisions are reported and left alone; the transfer skips
//!   destination files that already exist.
//! - Identical: groups whose members all hash equal are deduplicated down to
//!   the first (baseline) copy. Every member is hashed before anything is
//!   deleted; the first mismatch marks the group as a genuine conflict and
//!   leaves it untouched. One conflicting group does not stop the others.

use anyhow::Result;
use clap::ValueEnum;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

use crate::ops::hash::file_digest;
use crate::ops::scan::CollisionGroup;

/// What to do when the same logical file exists on several branches.
/// Fixed for the whole invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CollisionPolicy {
    /// Abort consolidation of a target that has any collision.
    Abort,
    /// Deduplicate identical copies; report conflicting ones.
    #[default]
    Identical,
    /// Report collisions and let the transfer skip existing files.
    Ignore,
}

impl CollisionPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Some(CollisionPolicy::Abort),
            "identical" => Some(CollisionPolicy::Identical),
            "ignore" => Some(CollisionPolicy::Ignore),
            _ => None,
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CollisionPolicy::Abort => "abort",
            CollisionPolicy::Identical => "identical",
            CollisionPolicy::Ignore => "ignore",
        };
        f.write_str(s)
    }
}

impl FromStr for CollisionPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid collision policy: '{s}'"))
    }
}

/// Per-group result of the Identical policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    /// All members matched the baseline; the others were removed (or would
    /// be, under dry-run).
    Deduplicated {
        baseline: PathBuf,
        removed: Vec<PathBuf>,
    },
    /// A member differed from the baseline; the group was left intact.
    Conflict {
        baseline: PathBuf,
        differing: PathBuf,
    },
}

/// Apply the Identical policy to one group. The first member is the baseline.
/// Hashing errors propagate: a half-compared group must not be modified.
pub fn dedupe_group(group: &CollisionGroup, dry_run: bool) -> Result<GroupOutcome> {
    let baseline = &group[0];
    let baseline_digest = file_digest(baseline)?;
    info!(path = %baseline.display(), digest = %baseline_digest, "collision baseline");

    // Hash everything up front; deletion only starts once the whole group
    // is known to be identical.
    for member in &group[1..] {
        let digest = file_digest(member)?;
        if digest != baseline_digest {
            warn!(
                baseline = %baseline.display(),
                differing = %member.display(),
                "collision members differ in content"
            );
            return Ok(GroupOutcome::Conflict {
                baseline: baseline.clone(),
                differing: member.clone(),
            });
        }
    }

    let mut removed = Vec::with_capacity(group.len() - 1);
    for member in &group[1..] {
        if dry_run {
            info!(path = %member.display(), "would remove duplicate (dry run)");
        } else {
            fs::remove_file(member)?;
            info!(path = %member.display(), "removed duplicate");
        }
        removed.push(member.clone());
    }
    Ok(GroupOutcome::Deduplicated {
        baseline: baseline.clone(),
        removed,
    })
}

/// Apply the Identical policy to every group independently.
pub fn dedupe_groups(groups: &[CollisionGroup], dry_run: bool) -> Result<Vec<GroupOutcome>> {
    groups
        .iter()
        .map(|group| dedupe_group(group, dry_run))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!(CollisionPolicy::parse("ABORT"), Some(CollisionPolicy::Abort));
        assert_eq!(
            CollisionPolicy::parse("identical"),
            Some(CollisionPolicy::Identical)
        );
        assert_eq!(CollisionPolicy::parse("Ignore"), Some(CollisionPolicy::Ignore));
        assert_eq!(CollisionPolicy::parse("nuke"), None);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for policy in [
            CollisionPolicy::Abort,
            CollisionPolicy::Identical,
            CollisionPolicy::Ignore,
        ] {
            assert_eq!(policy.to_string().parse::<CollisionPolicy>(), Ok(policy));
        }
    }
}
