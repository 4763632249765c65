//! Config module (modularized).
//! Provides configuration types, default paths, and XML loading.

pub mod paths;
pub mod types;
pub mod xml;

pub use paths::{CONFIG_ENV, default_config_path, default_log_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel, MIN_FREE_DEFAULT, MIN_FREE_DEFAULT_STR};
pub use xml::{LoadResult, create_template_config, load_config_from_xml_path, load_or_init};
