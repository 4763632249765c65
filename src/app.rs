//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the signal handler,
//! discovers the pool topology, and drives each target through
//! discover -> size -> collision scan -> plan -> resolve -> move.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::cli::{Args, LsArgs};
use crate::config::xml::LoadResult;
use crate::config::{CONFIG_ENV, Config, default_config_path, load_or_init};
use crate::errors::PoolError;
use crate::logging::init_tracing;
use crate::mount::{Mount, Topology, is_mountpoint, resolve};
use crate::ops::dedupe::{CollisionPolicy, GroupOutcome, dedupe_group};
use crate::ops::plan::{choose_branch, survey};
use crate::ops::scan::{CollisionGroup, branch_copies, scan_collisions};
use crate::ops::size::tree_size;
use crate::ops::space::format_bytes;
use crate::ops::transfer::consolidate;
use crate::output as out;
use crate::shutdown;

/// Run the consolidator.
pub fn run(args: Args) -> Result<()> {
    // Handle --print-config before logging init
    if args.print_config {
        if let Ok(cfg_env) = std::env::var(CONFIG_ENV) {
            out::print_info(&format!("Using {} (explicit):\n  {}\n", CONFIG_ENV, cfg_env));
            out::print_info(&format!(
                "To override, unset {} or set it to another file.",
                CONFIG_ENV
            ));
            return Ok(());
        }
        match default_config_path() {
            Ok(p) => {
                out::print_info(&format!("Default mergepool config path:\n  {}\n", p.display()));
                if p.exists() {
                    out::print_info("A config file already exists at that location.");
                } else {
                    out::print_info(
                        "No config file exists there yet. Run without --print-config to create a template.",
                    );
                }
            }
            Err(e) => {
                out::print_error(&format!("Could not determine a default config path: {e}"));
            }
        }
        return Ok(());
    }

    // Build config: XML first (a template is created on first run), CLI wins.
    let mut cfg = match load_or_init()? {
        LoadResult::CreatedTemplate(path) => {
            out::print_success(&format!(
                "A template mergepool config was written to: {}",
                path.display()
            ));
            out::print_info(
                "Edit the file to set `min_free_space`, `collision` and optionally `log_level` and `log_file`, then re-run this command.",
            );
            return Ok(());
        }
        LoadResult::Loaded(cfg) => cfg,
        LoadResult::Absent => Config::default(),
    };
    args.apply_overrides(&mut cfg);

    // Initialize logging and capture the guard so we can drop it on signal
    let guard_opt = init_tracing(&cfg.log_level, cfg.log_file.as_deref(), args.json)
        .map_err(|e| {
            out::print_error(&format!("Failed to initialize logging: {}", e));
            e
        })?;

    // Guard needs to be dropped on SIGINT to flush logs
    let guard_slot = Arc::new(Mutex::new(guard_opt));
    {
        let guard_slot = Arc::clone(&guard_slot);
        ctrlc::set_handler(move || {
            shutdown::request();
            out::print_warn("Received interrupt; stopping after the current target...");
            if let Ok(mut g) = guard_slot.lock() {
                let _ = g.take(); // drop guard here to flush tracing_appender
            }
        })
        .context("failed to install signal handler")?;
    }

    debug!("Starting mergepool: {:?}", args);
    if cfg.dry_run {
        out::print_info("Dry run: planning only, nothing will be modified.");
    }

    let result = (|| -> Result<()> {
        let topology = Topology::discover()?;
        if topology.is_empty() {
            out::print_warn("No mergerfs pools found in the mount table; nothing to do.");
            return Ok(());
        }
        info!(pools = topology.len(), "topology discovered");

        for target in &args.targets {
            if shutdown::is_requested() {
                warn!("shutdown requested; remaining targets skipped");
                break;
            }
            if let Err(e) = process_target(&topology, target, &cfg) {
                // A failed target must not sink the rest of the invocation.
                error!(target = %target.display(), error = ?e, "target failed");
                out::print_error(&format!("{}: {:#}", target.display(), e));
            }
        }
        Ok(())
    })();

    // Ensure logs are flushed before exit
    if let Ok(mut g) = guard_slot.lock() {
        let _ = g.take();
    }

    result
}

/// Drive one target directory through the full state machine.
fn process_target(topology: &Topology, target: &Path, cfg: &Config) -> Result<()> {
    let abs = std::path::absolute(target)
        .with_context(|| format!("absolutize '{}'", target.display()))?;

    let meta = match fs::symlink_metadata(&abs) {
        Ok(m) => m,
        Err(e) => {
            out::print_warn(&format!("{}: cannot stat ({}); skipping", abs.display(), e));
            return Ok(());
        }
    };
    if meta.file_type().is_symlink() || !meta.is_dir() {
        out::print_warn(&format!(
            "{}: not a regular directory; skipping",
            abs.display()
        ));
        return Ok(());
    }
    if is_mountpoint(&abs)? {
        out::print_warn(&format!(
            "{}: is itself a mountpoint; skipping",
            abs.display()
        ));
        return Ok(());
    }

    let Some(mount) = topology.owner_of(&abs)? else {
        let err = PoolError::NotManaged(abs.clone());
        info!(code = err.code(), target = %abs.display(), "target skipped");
        return Ok(());
    };

    let resolved = resolve(&mount, &abs)?;
    let target_size = tree_size(&abs)?;
    let collisions = scan_collisions(&abs, &mount)?;
    info!(
        target = %abs.display(),
        size = target_size,
        collisions = collisions.len(),
        "target scanned"
    );

    let candidates = survey(&mount, &resolved.relative)?;
    let Some(placement) = choose_branch(&candidates, target_size, cfg.min_free) else {
        let err = PoolError::NoFeasiblePlacement(abs.clone());
        warn!(code = err.code(), target = %abs.display(), "no feasible placement");
        out::print_warn(&format!(
            "No free space: no branch can take {} of '{}' and keep {} free",
            format_bytes(target_size),
            abs.display(),
            format_bytes(cfg.min_free)
        ));
        return Ok(());
    };
    let chosen = &candidates[placement.index];
    info!(
        branch = %chosen.branch.display(),
        needs_create = placement.needs_create,
        projected_free = placement.projected_free,
        "branch chosen"
    );
    out::print_info(&format!(
        "Consolidating '{}' onto {} (projected free space {})",
        abs.display(),
        chosen.branch.display(),
        format_bytes(placement.projected_free)
    ));

    match cfg.collision {
        CollisionPolicy::Abort => {
            if !collisions.is_empty() {
                out::print_error(&format!(
                    "File collisions found; aborting consolidation of '{}'",
                    abs.display()
                ));
                report_groups(&collisions);
                return Ok(());
            }
        }
        CollisionPolicy::Identical => {
            if !collisions.is_empty() {
                report_groups(&collisions);
                let mut conflicts = 0usize;
                for group in &collisions {
                    match dedupe_group(group, cfg.dry_run)? {
                        GroupOutcome::Deduplicated { baseline, removed } => {
                            let verb = if cfg.dry_run { "Would remove" } else { "Removed" };
                            out::print_user(&format!(
                                "{} {} duplicate(s) of {}",
                                verb,
                                removed.len(),
                                baseline.display()
                            ));
                        }
                        GroupOutcome::Conflict { baseline, differing } => {
                            conflicts += 1;
                            out::print_error(&format!(
                                "Collision with different contents: {} vs {}",
                                baseline.display(),
                                differing.display()
                            ));
                        }
                    }
                }
                if conflicts > 0 {
                    out::print_warn(&format!(
                        "{} conflicting group(s) left in place; the move will skip existing destination files",
                        conflicts
                    ));
                }
            }
        }
        CollisionPolicy::Ignore => {
            if !collisions.is_empty() {
                report_groups(&collisions);
                out::print_info("Collisions ignored; existing destination files will be skipped.");
            }
        }
    }

    consolidate(&candidates, placement, cfg.dry_run)?;
    info!(target = %abs.display(), "target done");
    Ok(())
}

fn report_groups(groups: &[CollisionGroup]) {
    for group in groups {
        out::print_user(&out::join_copies(group));
    }
}

/// Run the branch lister.
pub fn run_ls(args: LsArgs) -> Result<()> {
    let topology = Topology::discover()?;
    for target in &args.targets {
        let abs = std::path::absolute(target)
            .with_context(|| format!("absolutize '{}'", target.display()))?;
        if (args.files && !abs.is_file()) || (args.directories && !abs.is_dir()) {
            continue;
        }
        let Some(mount) = topology.owner_of(&abs)? else {
            debug!(target = %abs.display(), "not on a pooled mountpoint");
            continue;
        };
        print_target(&mount, &abs, args.quiet)?;
    }
    Ok(())
}

fn print_target(mount: &Mount<'_>, abs: &Path, quiet: bool) -> Result<()> {
    let copies = branch_copies(mount, abs)?;
    if copies.len() > 1 || !quiet {
        out::print_branch_line(abs, &copies, quiet);
    }
    Ok(())
}
