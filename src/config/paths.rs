//! Default path helpers and symlink checks.
//! Determines the config/log locations and detects symlinked ancestors so we
//! never create files through attacker-controlled links.

use anyhow::{Context, Result};
use dirs::{config_dir, data_dir};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file location.
pub const CONFIG_ENV: &str = "MERGEPOOL_CONFIG";

/// Config path in use: `MERGEPOOL_CONFIG` if set, else the platform config
/// directory.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(explicit) = env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(explicit));
    }
    let base = config_dir()
        .or_else(|| env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .context("no config directory could be determined")?;
    Ok(base.join("mergepool").join("config.xml"))
}

/// Default log file location (platform data dir).
pub fn default_log_path() -> Result<PathBuf> {
    let base = data_dir()
        .or_else(|| {
            env::var_os("HOME").map(|h| PathBuf::from(h).join(".local").join("share"))
        })
        .context("no data directory could be determined")?;
    Ok(base.join("mergepool").join("mergepool.log"))
}

/// Return true if any existing ancestor of `path` is a symlink.
pub fn path_has_symlink_ancestor(path: &Path) -> io::Result<bool> {
    let mut p = path.parent();
    while let Some(anc) = p {
        if anc.exists() {
            let meta = fs::symlink_metadata(anc)?;
            if meta.file_type().is_symlink() {
                return Ok(true);
            }
        }
        p = anc.parent();
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symlink_ancestor_detected() {
        let td = tempfile::tempdir().unwrap();
        let real = td.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = td.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        assert!(path_has_symlink_ancestor(&link.join("cfg.xml")).unwrap());
        assert!(!path_has_symlink_ancestor(&real.join("cfg.xml")).unwrap());
    }
}
