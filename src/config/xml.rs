//! XML configuration support.
//! - Loads settings from config.xml (quick_xml).
//! - Creates a commented template if missing (unless MERGEPOOL_CONFIG is set).
//!
//! Notes:
//! - This module only reads/writes the config file; CLI override precedence
//!   is applied by the app.
//! - Unknown XML fields are a hard error to surface misconfigurations early.

use anyhow::{Context, Result, bail};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::paths::{CONFIG_ENV, default_config_path, default_log_path, path_has_symlink_ancestor};
use super::types::{Config, LogLevel, MIN_FREE_DEFAULT_STR};
use crate::ops::dedupe::CollisionPolicy;
use crate::ops::space::parse_size;

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    /// Size string, e.g. "400GB"
    min_free_space: Option<String>,
    /// abort | identical | ignore
    collision: Option<String>,
    /// quiet | normal | info | debug
    log_level: Option<String>,
    log_file: Option<String>,
}

/// Outcome of the startup config load.
#[derive(Debug)]
pub enum LoadResult {
    /// No config existed; a template was written at the default path.
    CreatedTemplate(PathBuf),
    /// Config file parsed.
    Loaded(Config),
    /// No config file and no template created (explicit path missing).
    Absent,
}

/// Load the config file, creating a template on first run at the default
/// location. An explicitly configured path (`MERGEPOOL_CONFIG`) that does
/// not exist is reported as Absent rather than silently templated.
pub fn load_or_init() -> Result<LoadResult> {
    let path = default_config_path()?;
    if !path.exists() {
        if env::var_os(CONFIG_ENV).is_some() {
            return Ok(LoadResult::Absent);
        }
        create_template_config(&path)?;
        return Ok(LoadResult::CreatedTemplate(path));
    }
    load_config_from_xml_path(&path).map(LoadResult::Loaded)
}

fn xml_to_config(parsed: XmlConfig, path: &Path) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(s) = parsed.min_free_space.as_deref() {
        cfg.min_free = parse_size(s.trim())
            .with_context(|| format!("min_free_space in '{}'", path.display()))?;
    }
    if let Some(s) = parsed.collision.as_deref() {
        match CollisionPolicy::parse(s.trim()) {
            Some(policy) => cfg.collision = policy,
            None => bail!(
                "invalid collision policy '{}' in '{}' (expected abort, identical or ignore)",
                s.trim(),
                path.display()
            ),
        }
    }
    if let Some(s) = parsed.log_level.as_deref()
        && let Some(level) = LogLevel::parse(s.trim())
    {
        cfg.log_level = level;
    }
    if let Some(s) = parsed.log_file.as_deref() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            cfg.log_file = Some(PathBuf::from(trimmed));
        }
    }
    Ok(cfg)
}

/// Load a Config from a specific XML file path (quick_xml).
pub fn load_config_from_xml_path(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    xml_to_config(parsed, path)
}

/// Create the default template config file and parent directory with
/// conservative permissions. Refuses to write through symlinked ancestors.
pub fn create_template_config(path: &Path) -> Result<()> {
    if path_has_symlink_ancestor(path)? {
        bail!(
            "Refusing to create config: ancestor of {} is a symlink",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
        let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
    }

    let suggested_log = default_log_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "/path/to/mergepool.log".into());

    let content = format!(
        "<!--\n  mergepool configuration (XML)\n\n  Fields:\n    min_free_space -> free-space floor a destination branch must keep\n                      (accepts B, KB, MB, GB, TB suffixes)\n    collision      -> abort | identical | ignore\n    log_level      -> quiet | normal | info | debug\n    log_file       -> path to log file (optional; console logging always on)\n\n  Notes:\n    - CLI flags override XML values.\n    - Set {} to use a config file at another location.\n-->\n<config>\n  <min_free_space>{}</min_free_space>\n  <collision>identical</collision>\n  <log_level>normal</log_level>\n  <log_file>{}</log_file>\n</config>\n",
        CONFIG_ENV, MIN_FREE_DEFAULT_STR, suggested_log
    );

    fs::write(path, content)?;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.xml");
        fs::write(
            &path,
            "<config>\n  <min_free_space>10GB</min_free_space>\n  <collision>abort</collision>\n  <log_level>debug</log_level>\n  <log_file>/tmp/mp.log</log_file>\n</config>\n",
        )
        .unwrap();
        let cfg = load_config_from_xml_path(&path).unwrap();
        assert_eq!(cfg.min_free, 10 << 30);
        assert_eq!(cfg.collision, CollisionPolicy::Abort);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/mp.log")));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.xml");
        fs::write(&path, "<config><collision>ignore</collision></config>").unwrap();
        let cfg = load_config_from_xml_path(&path).unwrap();
        assert_eq!(cfg.collision, CollisionPolicy::Ignore);
        assert_eq!(cfg.min_free, 400 << 30);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.xml");
        fs::write(&path, "<config><surprise>1</surprise></config>").unwrap();
        assert!(load_config_from_xml_path(&path).is_err());
    }

    #[test]
    fn bad_policy_is_rejected() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.xml");
        fs::write(&path, "<config><collision>maybe</collision></config>").unwrap();
        assert!(load_config_from_xml_path(&path).is_err());
    }

    #[test]
    fn template_round_trips() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested").join("config.xml");
        create_template_config(&path).unwrap();
        let cfg = load_config_from_xml_path(&path).unwrap();
        assert_eq!(cfg.min_free, 400 << 30);
        assert_eq!(cfg.collision, CollisionPolicy::Identical);
    }
}
