//! Pool topology: which mountpoints are mergerfs pools, and which branches
//! back each of them.
//!
//! - The mount table (`/proc/mounts`) identifies pooled mountpoints by the
//!   `fuse.mergerfs` filesystem type.
//! - Each pool publishes its ordered branch list as the
//!   `user.mergerfs.branches` xattr on the `.mergerfs` control file at the
//!   mountpoint root. Entries may carry an `=mode` suffix which is stripped.
//! - A mountpoint whose attribute cannot be read is excluded with a warning;
//!   the rest of the run proceeds.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::PoolError;

pub const PROC_MOUNTS: &str = "/proc/mounts";
pub const POOL_FSTYPE: &str = "fuse.mergerfs";
pub const CONTROL_FILE: &str = ".mergerfs";
pub const BRANCHES_XATTR: &str = "user.mergerfs.branches";

/// Immutable map from pooled mountpoint to its ordered branch list.
/// Built once per invocation from the live mount table.
#[derive(Debug, Default)]
pub struct Topology {
    mounts: BTreeMap<PathBuf, Vec<PathBuf>>,
}

/// Borrowed view of one pool: its mountpoint and branch list in priority order.
#[derive(Debug, Clone, Copy)]
pub struct Mount<'t> {
    pub mountpoint: &'t Path,
    pub branches: &'t [PathBuf],
}

/// One branch's candidate location for a logical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPath {
    pub branch: PathBuf,
    pub path: PathBuf,
}

/// Result of resolving an absolute path against its owning pool.
/// Candidate paths are computed for every branch without existence checks;
/// existence is the caller's concern.
#[derive(Debug)]
pub struct Resolved {
    pub mountpoint: PathBuf,
    pub relative: PathBuf,
    pub candidates: Vec<BranchPath>,
}

impl Topology {
    /// Read the live mount table and the branch attribute of every pool found.
    pub fn discover() -> Result<Self> {
        let table = fs::read_to_string(PROC_MOUNTS)
            .with_context(|| format!("read mount table '{}'", PROC_MOUNTS))?;
        let mut mounts = BTreeMap::new();
        for point in pooled_mountpoints(&table) {
            match read_branch_attr(&point) {
                Ok(branches) if !branches.is_empty() => {
                    debug!(mountpoint = %point.display(), branches = branches.len(), "pool discovered");
                    mounts.insert(point, branches);
                }
                Ok(_) => {
                    warn!(mountpoint = %point.display(), "pool has an empty branch list; excluded");
                }
                Err(source) => {
                    let err = PoolError::BranchAttr {
                        mountpoint: point.clone(),
                        source,
                    };
                    warn!(code = err.code(), mountpoint = %point.display(), error = %err, "pool excluded");
                }
            }
        }
        Ok(Self { mounts })
    }

    /// Build a topology from explicit entries. Used by tests and by callers
    /// that already know their pools.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, Vec<PathBuf>)>,
    {
        Self {
            mounts: entries.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    /// Branch list for an exact mountpoint, if pooled.
    pub fn lookup(&self, mountpoint: &Path) -> Option<Mount<'_>> {
        self.mounts
            .get_key_value(mountpoint)
            .map(|(m, b)| Mount {
                mountpoint: m,
                branches: b,
            })
    }

    /// Pool owning `abs`, if any: the path's mountpoint (per the OS stat
    /// facility) must itself be a known pooled mountpoint. `None` means the
    /// path is not managed and the caller should skip it.
    pub fn owner_of(&self, abs: &Path) -> io::Result<Option<Mount<'_>>> {
        let point = find_mountpoint(abs)?;
        Ok(self.lookup(&point))
    }
}

/// Mountpoints of `fuse.mergerfs` entries in a mount table.
pub fn pooled_mountpoints(table: &str) -> Vec<PathBuf> {
    table
        .lines()
        .filter_map(parse_mount_line)
        .collect()
}

/// Parse one mount table line, returning the mountpoint if the entry is a
/// pool. Fields are whitespace-separated: device, mountpoint, fstype, ...
/// The mountpoint field octal-escapes whitespace (`\040` for space).
fn parse_mount_line(line: &str) -> Option<PathBuf> {
    let mut fields = line.split_whitespace();
    let _device = fields.next()?;
    let point = fields.next()?;
    let fstype = fields.next()?;
    if fstype != POOL_FSTYPE {
        return None;
    }
    Some(PathBuf::from(unescape_mount_field(point)))
}

/// Decode the octal escapes the kernel uses in mount table path fields.
fn unescape_mount_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let digits: String = chars.clone().take(3).collect();
        if digits.len() == 3 && let Ok(code) = u8::from_str_radix(&digits, 8) {
            out.push(code as char);
            chars.nth(2);
        } else {
            out.push(c);
        }
    }
    out
}

/// Read and sanitize the branch list attribute of one mountpoint.
fn read_branch_attr(mountpoint: &Path) -> io::Result<Vec<PathBuf>> {
    let control = mountpoint.join(CONTROL_FILE);
    let raw = xattr::get(&control, BRANCHES_XATTR)?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("attribute {} missing on {}", BRANCHES_XATTR, control.display()),
        )
    })?;
    Ok(parse_branch_list(&String::from_utf8_lossy(&raw)))
}

/// Split a colon-separated branch list, stripping any `=mode` suffix from
/// each entry (e.g. `/mnt/disk1=RW`).
pub fn parse_branch_list(raw: &str) -> Vec<PathBuf> {
    raw.trim()
        .split(':')
        .map(|entry| entry.split('=').next().unwrap_or(entry))
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Mountpoint owning `path`: the deepest ancestor whose parent lives on a
/// different device. Resolves to the filesystem root if nothing closer is a
/// mount boundary.
pub fn find_mountpoint(path: &Path) -> io::Result<PathBuf> {
    let mut current = fs::canonicalize(path)?;
    let device = fs::metadata(&current)?.dev();
    while let Some(parent) = current.parent() {
        if fs::metadata(parent)?.dev() != device {
            break;
        }
        current = parent.to_path_buf();
    }
    Ok(current)
}

/// Whether `path` is itself a mount boundary (device differs from parent).
pub fn is_mountpoint(path: &Path) -> io::Result<bool> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(false);
    }
    match path.parent() {
        Some(parent) => Ok(fs::metadata(parent)?.dev() != meta.dev()),
        // The filesystem root is always a mountpoint.
        None => Ok(true),
    }
}

/// Compute the mountpoint-relative path of `abs` and its candidate location
/// on every branch of the pool. No existence checks are performed.
pub fn resolve(mount: &Mount<'_>, abs: &Path) -> Result<Resolved> {
    let relative = abs
        .strip_prefix(mount.mountpoint)
        .map_err(|_| PoolError::NotManaged(abs.to_path_buf()))?
        .to_path_buf();
    let candidates = mount
        .branches
        .iter()
        .map(|branch| BranchPath {
            branch: branch.clone(),
            path: branch.join(&relative),
        })
        .collect();
    Ok(Resolved {
        mountpoint: mount.mountpoint.to_path_buf(),
        relative,
        candidates,
    })
}
