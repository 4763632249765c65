//! CLI definition and parsing.
//! Defines the argument structs for both binaries and provides parse helpers.
//!
//! Notes:
//! - CLI flags override config values (which are loaded from XML if present).
//! - --debug is a shorthand for --log-level debug.

use clap::{Parser, ValueHint};
use std::path::PathBuf;

use crate::config::types::{Config, LogLevel};
use crate::ops::dedupe::CollisionPolicy;
use crate::ops::space::parse_size;

/// Consolidator arguments (`mergepool`).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Consolidate pooled directories spread across mergerfs branches onto one branch"
)]
pub struct Args {
    /// Directories to consolidate, processed in order.
    #[arg(
        value_name = "DIRECTORY",
        value_hint = ValueHint::DirPath,
        required_unless_present = "print_config"
    )]
    pub targets: Vec<PathBuf>,

    /// Free-space floor the destination branch must keep after the move.
    #[arg(
        short = 'm',
        long = "minspace",
        value_name = "SIZE",
        value_parser = parse_minspace,
        help = "Minimum free space to keep on the destination branch (accepts B, KB, MB, GB, TB suffixes)"
    )]
    pub minspace: Option<u64>,

    /// Action on file collision between branches.
    #[arg(
        short = 'c',
        long,
        value_enum,
        help = "On collision: abort consolidation, deduplicate identical copies, or ignore existing files"
    )]
    pub collision: Option<CollisionPolicy>,

    /// Dry run - decide everything, move nothing.
    #[arg(short = 'd', long = "dryrun", help = "Show what would be done, but do not modify files")]
    pub dry_run: bool,

    /// Enable debug logging (equivalent to `--log-level debug`).
    #[arg(long, help = "Enable debug logging (shorthand for --log-level debug)")]
    pub debug: bool,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, help = "Set log level: quiet, normal, info, debug")]
    pub log_level: Option<String>,

    /// Emit logs in structured JSON (includes timestamp, level, and structured fields).
    #[arg(long, help = "Emit logs in structured JSON")]
    pub json: bool,

    /// Print where mergepool will look for the config file, then exit.
    #[arg(long, help = "Print the config file location used by mergepool and exit")]
    pub print_config: bool,
}

fn parse_minspace(s: &str) -> Result<u64, String> {
    parse_size(s).map_err(|e| e.to_string())
}

impl Args {
    /// Effective log level derived from flags.
    /// Precedence: --debug > --log-level value > None (use config default).
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        if self.debug {
            return Some(LogLevel::Debug);
        }
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(min_free) = self.minspace {
            cfg.min_free = min_free;
        }
        if let Some(policy) = self.collision {
            cfg.collision = policy;
        }
        if let Some(level) = self.effective_log_level() {
            cfg.log_level = level;
        }
        if self.dry_run {
            cfg.dry_run = true;
        }
    }
}

/// Lister arguments (`mpls`).
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "List which mergerfs branches hold copies of a path"
)]
pub struct LsArgs {
    /// Files or directories to check.
    #[arg(value_name = "PATH", value_hint = ValueHint::AnyPath, required = true)]
    pub targets: Vec<PathBuf>,

    /// Only output paths present in multiple branches, without colour.
    #[arg(short = 'q', long, help = "Only output paths present in multiple branches, no colour")]
    pub quiet: bool,

    /// List only directories.
    #[arg(short = 'd', long, conflicts_with = "files", help = "List only directories")]
    pub directories: bool,

    /// List only files.
    #[arg(short = 'f', long, help = "List only files")]
    pub files: bool,
}

pub fn parse() -> Args {
    Args::parse()
}

pub fn parse_ls() -> LsArgs {
    LsArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minspace_accepts_suffixes() {
        let args = Args::try_parse_from(["mergepool", "-m", "10GB", "/pool/tv"]).unwrap();
        assert_eq!(args.minspace, Some(10 << 30));
    }

    #[test]
    fn bad_minspace_is_rejected() {
        assert!(Args::try_parse_from(["mergepool", "-m", "10XB", "/pool/tv"]).is_err());
    }

    #[test]
    fn collision_policy_is_a_value_enum() {
        let args = Args::try_parse_from(["mergepool", "-c", "abort", "/pool/tv"]).unwrap();
        assert_eq!(args.collision, Some(CollisionPolicy::Abort));
        assert!(Args::try_parse_from(["mergepool", "-c", "nuke", "/pool/tv"]).is_err());
    }

    #[test]
    fn targets_required_unless_print_config() {
        assert!(Args::try_parse_from(["mergepool"]).is_err());
        assert!(Args::try_parse_from(["mergepool", "--print-config"]).is_ok());
    }

    #[test]
    fn overrides_win_over_config() {
        let args =
            Args::try_parse_from(["mergepool", "-m", "1GB", "-c", "ignore", "--dryrun", "/t"])
                .unwrap();
        let mut cfg = Config::default();
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.min_free, 1 << 30);
        assert_eq!(cfg.collision, CollisionPolicy::Ignore);
        assert!(cfg.dry_run);
    }

    #[test]
    fn debug_flag_is_log_level_shorthand() {
        let args = Args::try_parse_from(["mergepool", "--debug", "/t"]).unwrap();
        assert_eq!(args.effective_log_level(), Some(LogLevel::Debug));
    }

    #[test]
    fn ls_flags_parse() {
        let args = LsArgs::try_parse_from(["mpls", "-q", "-f", "/pool/a", "/pool/b"]).unwrap();
        assert!(args.quiet);
        assert!(args.files);
        assert!(!args.directories);
        assert_eq!(args.targets.len(), 2);
    }

    #[test]
    fn ls_requires_targets() {
        assert!(LsArgs::try_parse_from(["mpls"]).is_err());
    }
}
