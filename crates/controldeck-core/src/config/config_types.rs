//! Typed settings read from the `[default]` and `[gui]` sections.
//!
//! Every setting is parsed on its own; a malformed value logs a warning and
//! falls back to its default without affecting the others.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use super::{ConfigSection, Ini};
use crate::util::parse_flag;

pub const DEFAULT_SECTION: &str = "default";
pub const GUI_SECTION: &str = "gui";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

/// Which pactl output format the audio adapter should read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudioBackendPreference {
    #[default]
    Auto,
    Json,
    Text,
}

impl FromStr for AudioBackendPreference {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown audio backend `{other}`")),
        }
    }
}

/// Server-side settings from `[default]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckSettings {
    pub host: String,
    pub port: u16,
    pub log_level: Option<String>,
    /// Upper bound for state probes; 0 waits forever.
    pub probe_timeout_ms: u64,
    pub audio_backend: AudioBackendPreference,
}

impl Default for DeckSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: None,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            audio_backend: AudioBackendPreference::Auto,
        }
    }
}

impl DeckSettings {
    pub fn from_ini(ini: &Ini) -> Self {
        let section = ini.section(DEFAULT_SECTION);
        let defaults = Self::default();
        Self {
            host: setting_value(section, "host")
                .filter(|host| !host.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.host),
            port: parse_setting(section, DEFAULT_SECTION, "port", defaults.port),
            log_level: setting_value(section, "log-level")
                .filter(|level| !level.is_empty())
                .map(str::to_string),
            probe_timeout_ms: parse_setting(
                section,
                DEFAULT_SECTION,
                "probe-timeout-ms",
                defaults.probe_timeout_ms,
            ),
            audio_backend: parse_setting(
                section,
                DEFAULT_SECTION,
                "audio-backend",
                defaults.audio_backend,
            ),
        }
    }

    pub fn probe_timeout(&self) -> Option<Duration> {
        if self.probe_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.probe_timeout_ms))
        }
    }
}

/// Desktop window options from `[gui]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuiSettings {
    pub width: u32,
    pub height: u32,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub min_width: u32,
    pub min_height: u32,
    pub resizable: bool,
    pub fullscreen: bool,
    pub frameless: bool,
    pub minimized: bool,
    pub maximized: bool,
    pub always_on_top: bool,
    pub confirm_close: bool,
    pub transparent: bool,
    pub menu: bool,
    /// Command template that opens the deck URL in a window.
    pub browser: Option<String>,
}

impl Default for GuiSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            x: None,
            y: None,
            min_width: 200,
            min_height: 100,
            resizable: true,
            fullscreen: false,
            frameless: false,
            minimized: false,
            maximized: false,
            always_on_top: false,
            confirm_close: false,
            transparent: true,
            menu: true,
            browser: None,
        }
    }
}

impl GuiSettings {
    pub fn from_ini(ini: &Ini) -> Self {
        let section = ini.section(GUI_SECTION);
        let d = Self::default();
        let name = GUI_SECTION;
        Self {
            width: parse_setting(section, name, "width", d.width),
            height: parse_setting(section, name, "height", d.height),
            x: parse_optional(section, name, "x"),
            y: parse_optional(section, name, "y"),
            min_width: parse_setting(section, name, "min-width", d.min_width),
            min_height: parse_setting(section, name, "min-height", d.min_height),
            resizable: parse_toggle(section, name, "resizable", d.resizable),
            fullscreen: parse_toggle(section, name, "fullscreen", d.fullscreen),
            frameless: parse_toggle(section, name, "frameless", d.frameless),
            minimized: parse_toggle(section, name, "minimized", d.minimized),
            maximized: parse_toggle(section, name, "maximized", d.maximized),
            always_on_top: parse_toggle(section, name, "always-on-top", d.always_on_top),
            confirm_close: parse_toggle(section, name, "confirm-close", d.confirm_close),
            transparent: parse_toggle(section, name, "transparent", d.transparent),
            menu: parse_toggle(section, name, "menu", d.menu),
            browser: setting_value(section, "browser")
                .filter(|cmd| !cmd.is_empty())
                .map(str::to_string),
        }
    }
}

/// Look up a kebab-case key, also accepting the snake_case spelling.
fn setting_value<'a>(section: Option<&'a ConfigSection>, key: &str) -> Option<&'a str> {
    let section = section?;
    section
        .get(key)
        .or_else(|| section.get(&key.replace('-', "_")))
}

fn parse_setting<T>(section: Option<&ConfigSection>, name: &str, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = setting_value(section, key) else {
        return default;
    };
    if raw.is_empty() {
        return default;
    }
    match raw.parse() {
        Ok(value) => value,
        Err(err) => {
            warn!(section = name, key, value = raw, %err, fallback = %default, "invalid setting");
            default
        }
    }
}

fn parse_optional<T>(section: Option<&ConfigSection>, name: &str, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = setting_value(section, key)?;
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(section = name, key, value = raw, %err, "invalid setting, leaving unset");
            None
        }
    }
}

fn parse_toggle(section: Option<&ConfigSection>, name: &str, key: &str, default: bool) -> bool {
    let Some(raw) = setting_value(section, key) else {
        return default;
    };
    parse_flag(raw).unwrap_or_else(|| {
        if !raw.is_empty() {
            warn!(section = name, key, value = raw, fallback = default, "invalid flag");
        }
        default
    })
}

impl Display for AudioBackendPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Auto => "auto",
            Self::Json => "json",
            Self::Text => "text",
        };
        f.write_str(label)
    }
}
