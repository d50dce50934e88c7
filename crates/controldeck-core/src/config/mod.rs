//! Configuration module wiring for ControlDeck.
//!
//! Keeps INI parsing, file I/O and typed settings in separate files.

mod config_ini;
mod config_io;
mod config_types;

pub use config_ini::{ConfigSection, Ini};
pub use config_io::{
    configured_log_level, default_config_dir, load_config, read_ini, resolve_config_path,
    save_config_text, ConfigError, ConfigSource, LoadedConfig, APP_NAME, CONFIG_FILE_NAME,
};
pub use config_types::*;
