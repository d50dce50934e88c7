//! Relaxed INI parsing for controldeck.conf.
//!
//! Repeated section headers merge into one section and repeated keys keep the
//! last value, so hand-edited files with duplicates still load.

use indexmap::IndexMap;

use super::ConfigError;

/// One `[section]` of the config file with its keys in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    name: String,
    entries: IndexMap<String, String>,
}

impl ConfigSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a key; key names are case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key.to_ascii_lowercase().as_str())
            .map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed config file: sections in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ini {
    sections: IndexMap<String, ConfigSection>,
}

impl Ini {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut ini = Ini::default();
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end_matches('\r');
            let trimmed = line.trim();

            if trimmed.is_empty() {
                last_key = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let indented = line.starts_with(|ch: char| ch.is_whitespace());
            if indented {
                if let (Some(section), Some(key)) = (current.as_ref(), last_key.as_ref()) {
                    // Indented lines continue the previous value.
                    if let Some(entry) = ini
                        .sections
                        .get_mut(section)
                        .and_then(|s| s.entries.get_mut(key))
                    {
                        entry.push('\n');
                        entry.push_str(trimmed);
                    }
                    continue;
                }
            }

            if trimmed.starts_with('[') {
                let Some(end) = trimmed.rfind(']') else {
                    return Err(parse_error(line_no, "unterminated section header"));
                };
                let name = &trimmed[1..end];
                if name.is_empty() {
                    return Err(parse_error(line_no, "empty section name"));
                }
                ini.sections
                    .entry(name.to_string())
                    .or_insert_with(|| ConfigSection::new(name));
                current = Some(name.to_string());
                last_key = None;
                continue;
            }

            let Some(split) = trimmed.find(['=', ':']) else {
                return Err(parse_error(line_no, "expected `key = value`"));
            };
            let key = trimmed[..split].trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(parse_error(line_no, "empty key"));
            }
            let value = trimmed[split + 1..].trim();
            let Some(section) = current.as_ref() else {
                return Err(parse_error(line_no, "key outside of any section"));
            };
            if let Some(section) = ini.sections.get_mut(section) {
                section.entries.insert(key.clone(), value.to_string());
            }
            last_key = Some(key);
        }

        Ok(ini)
    }

    pub fn section(&self, name: &str) -> Option<&ConfigSection> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = &ConfigSection> {
        self.sections.values()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn parse_error(line: usize, message: &str) -> ConfigError {
    ConfigError::ParseFailed {
        line,
        message: message.to_string(),
    }
}
