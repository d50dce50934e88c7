//! Configuration loading and path resolution.
//!
//! Loading never fails towards the caller: unreadable or malformed files are
//! logged and replaced by an empty config so the deck still comes up.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Ini, DEFAULT_SECTION};
use crate::util;

pub const APP_NAME: &str = "controldeck";
pub const CONFIG_FILE_NAME: &str = "controldeck.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFailed(String),
    #[error("failed to write config file: {0}")]
    WriteFailed(String),
    #[error("failed to parse config at line {line}: {message}")]
    ParseFailed { line: usize, message: String },
    #[error("missing $HOME, unable to resolve config directory")]
    MissingHome,
}

/// Where the active config file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit,
    Adjacent,
    UserDir,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Explicit => "custom",
            ConfigSource::Adjacent => "adjacent",
            ConfigSource::UserDir => "user",
        }
    }
}

/// Parsed config plus the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub ini: Ini,
    pub path: PathBuf,
    pub source: ConfigSource,
}

/// Resolve and read the config file, degrading to an empty config on any error.
pub fn load_config(explicit: Option<&Path>) -> LoadedConfig {
    let (path, source) = match resolve_config_path(explicit) {
        Ok(resolved) => resolved,
        Err(err) => {
            warn!(%err, "unable to resolve config path, using empty config");
            return LoadedConfig {
                ini: Ini::default(),
                path: PathBuf::from(CONFIG_FILE_NAME),
                source: ConfigSource::UserDir,
            };
        }
    };

    let ini = if path.exists() {
        match read_ini(&path) {
            Ok(ini) => ini,
            Err(err) => {
                warn!(path = %path.display(), %err, "config unusable, using empty config");
                Ini::default()
            }
        }
    } else {
        info!(path = %path.display(), "config file not found, using empty config");
        Ini::default()
    };

    debug!(path = %path.display(), source = source.as_str(), "config loaded");
    LoadedConfig { ini, path, source }
}

/// `[default] log-level` from the config that would be loaded, read without
/// logging so it can seed the subscriber before the real load.
pub fn configured_log_level(explicit: Option<&Path>) -> Option<String> {
    let (path, _) = resolve_config_path(explicit).ok()?;
    let ini = read_ini(&path).ok()?;
    ini.get(DEFAULT_SECTION, "log-level")
        .or_else(|| ini.get(DEFAULT_SECTION, "log_level"))
        .filter(|level| !level.is_empty())
        .map(str::to_string)
}

/// Read and parse one INI file.
pub fn read_ini(path: &Path) -> Result<Ini, ConfigError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigError::ReadFailed(err.to_string()))?;
    Ini::parse(&contents)
}

/// Pick the config file: explicit path, then next to the executable, then the
/// per-user directory (created only when it is the one selected).
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<(PathBuf, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        return Ok((util::expand_home(path), ConfigSource::Explicit));
    }
    if let Some(adjacent) = adjacent_config_path() {
        if adjacent.is_file() {
            return Ok((adjacent, ConfigSource::Adjacent));
        }
    }
    let dir = default_config_dir()?;
    if let Err(err) = fs::create_dir_all(&dir) {
        warn!(dir = %dir.display(), ?err, "failed to create config directory");
    }
    Ok((dir.join(CONFIG_FILE_NAME), ConfigSource::UserDir))
}

/// Return the per-user config directory based on XDG or $HOME.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    config_dir_from(env::var("XDG_CONFIG_HOME").ok(), env::var("HOME").ok())
}

fn config_dir_from(xdg: Option<String>, home: Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(xdg) = xdg.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(xdg).join(APP_NAME));
    }
    let home = home.ok_or(ConfigError::MissingHome)?;
    Ok(PathBuf::from(home).join(".config").join(APP_NAME))
}

fn adjacent_config_path() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let dir = exe.parent()?;
    Some(dir.join(CONFIG_FILE_NAME))
}

/// Overwrite an existing config file with edited text.
pub fn save_config_text(path: &Path, text: &str) -> Result<(), ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::WriteFailed(format!(
            "{} does not exist",
            path.display()
        )));
    }
    fs::write(path, text).map_err(|err| ConfigError::WriteFailed(err.to_string()))
}
