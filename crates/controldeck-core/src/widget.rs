//! Widget descriptors derived from config section names.
//!
//! A section header `[tab:][id.]type rest` becomes one descriptor placed at
//! `tree[tab][id]`; headers that do not fit the grammar are ignored.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::{ConfigSection, Ini, DEFAULT_SECTION};

/// Keys whose unset per-widget value falls back to `[default] <kind>-<key>`.
const PRESENTATION_KEYS: [&str; 6] = ["icon", "icon-alt", "image", "image-alt", "color-bg", "color-fg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    Empty,
    Label,
    Button,
    Slider,
    Sink,
    Source,
    SinkInput,
    SinkInputs,
}

impl WidgetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetKind::Empty => "empty",
            WidgetKind::Label => "label",
            WidgetKind::Button => "button",
            WidgetKind::Slider => "slider",
            WidgetKind::Sink => "sink",
            WidgetKind::Source => "source",
            WidgetKind::SinkInput => "sink-input",
            WidgetKind::SinkInputs => "sink-inputs",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "empty" => Some(WidgetKind::Empty),
            "label" => Some(WidgetKind::Label),
            "button" => Some(WidgetKind::Button),
            "slider" => Some(WidgetKind::Slider),
            "sink" => Some(WidgetKind::Sink),
            "source" => Some(WidgetKind::Source),
            "sink-input" => Some(WidgetKind::SinkInput),
            "sink-inputs" => Some(WidgetKind::SinkInputs),
            _ => None,
        }
    }

    /// Audio widgets backed by the volume adapter.
    pub fn is_volume(self) -> bool {
        matches!(
            self,
            WidgetKind::Sink | WidgetKind::Source | WidgetKind::SinkInput | WidgetKind::SinkInputs
        )
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One widget as declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetDescriptor {
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub name: String,
    pub properties: IndexMap<String, String>,
}

impl WidgetDescriptor {
    /// Property value, or `""` when the key is absent.
    pub fn prop(&self, key: &str) -> &str {
        self.properties.get(key).map(String::as_str).unwrap_or("")
    }

    /// Property value when present and non-empty.
    pub fn prop_opt(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Visible text: `description` if set, otherwise the section name rest.
    pub fn display_name(&self) -> &str {
        self.prop_opt("description").unwrap_or(&self.name)
    }
}

pub type WidgetSections = IndexMap<String, Vec<WidgetDescriptor>>;

/// `tab -> section id -> widgets`, all in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WidgetTree {
    tabs: IndexMap<String, WidgetSections>,
}

impl WidgetTree {
    pub fn insert(&mut self, tab: &str, section: &str, descriptor: WidgetDescriptor) {
        self.tabs
            .entry(tab.to_string())
            .or_default()
            .entry(section.to_string())
            .or_default()
            .push(descriptor);
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Total number of descriptors across all tabs.
    pub fn len(&self) -> usize {
        self.tabs
            .values()
            .flat_map(|sections| sections.values())
            .map(Vec::len)
            .sum()
    }

    pub fn tabs(&self) -> impl Iterator<Item = (&str, &WidgetSections)> {
        self.tabs.iter().map(|(name, sections)| (name.as_str(), sections))
    }

    pub fn tab(&self, name: &str) -> Option<&WidgetSections> {
        self.tabs.get(name)
    }

    pub fn widget(&self, id: WidgetId) -> Option<&WidgetDescriptor> {
        let (_, sections) = self.tabs.get_index(id.tab)?;
        let (_, widgets) = sections.get_index(id.section)?;
        widgets.get(id.index)
    }
}

/// Positional address of a descriptor inside a [`WidgetTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId {
    pub tab: usize,
    pub section: usize,
    pub index: usize,
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.tab, self.section, self.index)
    }
}

impl FromStr for WidgetId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split('-').map(str::parse::<usize>);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(tab)), Some(Ok(section)), Some(Ok(index)), None) => Ok(WidgetId {
                tab,
                section,
                index,
            }),
            _ => Err(format!("invalid widget id `{value}`")),
        }
    }
}

/// Parts of a section header that matched the widget grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionName {
    pub tab: String,
    pub section: String,
    pub kind: WidgetKind,
    pub name: String,
}

fn section_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Longer keywords first so `sink-inputs` never matches as `sink`.
        Regex::new(
            r"(?i)^([0-9a-z]*:)?([0-9]*\.)?(empty|label|button|slider|sink-inputs|sink-input|sink|source)",
        )
        .expect("section grammar is a valid regex")
    })
}

/// Split a section header into tab, section id, kind and name.
pub fn parse_section_name(header: &str) -> Option<SectionName> {
    let caps = section_pattern().captures(header)?;
    let whole = caps.get(0)?;
    let kind = WidgetKind::from_keyword(caps.get(3)?.as_str())?;
    let tab = caps
        .get(1)
        .map(|m| m.as_str().trim_end_matches(':').to_ascii_lowercase())
        .unwrap_or_default();
    let section = caps
        .get(2)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .unwrap_or_default();
    let rest = &header[whole.end()..];
    let name = rest
        .strip_prefix(|ch: char| ch.is_whitespace())
        .unwrap_or(rest)
        .to_string();
    Some(SectionName {
        tab,
        section,
        kind,
        name,
    })
}

/// Scan every config section and collect the widget tree.
pub fn build_widget_tree(ini: &Ini) -> WidgetTree {
    let defaults = ini.section(DEFAULT_SECTION);
    let mut tree = WidgetTree::default();
    for section in ini.sections() {
        let Some(parsed) = parse_section_name(section.name()) else {
            continue;
        };
        let properties = collect_properties(section, parsed.kind, defaults);
        tree.insert(
            &parsed.tab,
            &parsed.section,
            WidgetDescriptor {
                kind: parsed.kind,
                name: parsed.name,
                properties,
            },
        );
    }
    debug!(
        tabs = tree.tab_count(),
        widgets = tree.len(),
        "widget tree built"
    );
    tree
}

fn collect_properties(
    section: &ConfigSection,
    kind: WidgetKind,
    defaults: Option<&ConfigSection>,
) -> IndexMap<String, String> {
    let mut properties: IndexMap<String, String> = section
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    let Some(defaults) = defaults else {
        return properties;
    };
    for key in PRESENTATION_KEYS {
        let unset = properties.get(key).map(|v| v.is_empty()).unwrap_or(true);
        if !unset {
            continue;
        }
        if let Some(value) = defaults.get(&format!("{}-{}", kind.as_str(), key)) {
            properties.insert(key.to_string(), value.to_string());
        }
    }
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_from(text: &str) -> WidgetTree {
        build_widget_tree(&Ini::parse(text).expect("parse"))
    }

    #[test]
    fn bare_button_has_empty_coordinates() {
        let parsed = parse_section_name("button").expect("matches");
        assert_eq!(parsed.tab, "");
        assert_eq!(parsed.section, "");
        assert_eq!(parsed.kind, WidgetKind::Button);
        assert_eq!(parsed.name, "");
    }

    #[test]
    fn sink_inputs_is_not_classified_as_sink() {
        assert_eq!(
            parse_section_name("sink-inputs").map(|p| p.kind),
            Some(WidgetKind::SinkInputs)
        );
        assert_eq!(
            parse_section_name("2.SINK-INPUTS apps").map(|p| p.kind),
            Some(WidgetKind::SinkInputs)
        );
        assert_eq!(
            parse_section_name("sink-input 42").map(|p| (p.kind, p.name)),
            Some((WidgetKind::SinkInput, "42".to_string()))
        );
        assert_eq!(
            parse_section_name("sink Main").map(|p| p.kind),
            Some(WidgetKind::Sink)
        );
    }

    #[test]
    fn tab_and_section_are_split_off() {
        let parsed = parse_section_name("Audio:3.Slider Brightness: high.low").expect("matches");
        assert_eq!(parsed.tab, "audio");
        assert_eq!(parsed.section, "3");
        assert_eq!(parsed.kind, WidgetKind::Slider);
        assert_eq!(parsed.name, "Brightness: high.low");
    }

    #[test]
    fn non_widget_sections_are_skipped() {
        assert!(parse_section_name("default").is_none());
        assert!(parse_section_name("gui").is_none());
        let tree = tree_from("[default]\nhost = 0.0.0.0\n[gui]\nwidth = 10\n");
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn play_button_scenario() {
        let tree = tree_from("[1.button Play]\ncommand=echo hi\n");
        let widget = tree
            .widget(WidgetId {
                tab: 0,
                section: 0,
                index: 0,
            })
            .expect("widget");
        let (tab, sections) = tree.tabs().next().expect("tab");
        assert_eq!(tab, "");
        assert_eq!(sections.keys().next().map(String::as_str), Some("1"));
        assert_eq!(widget.kind, WidgetKind::Button);
        assert_eq!(widget.name, "Play");
        assert_eq!(widget.prop("command"), "echo hi");
        assert_eq!(widget.properties.len(), 1);
        assert_eq!(widget.prop("command-alt"), "");
    }

    #[test]
    fn declaration_order_is_kept_per_section() {
        let tree = tree_from(
            "[1.button A]\n[2.button B]\n[1.empty]\n[media:1.label Now]\n[1.button C]\n",
        );
        let tabs: Vec<_> = tree.tabs().map(|(name, _)| name).collect();
        assert_eq!(tabs, vec!["", "media"]);
        let main = tree.tab("").expect("main tab");
        let ids: Vec<_> = main.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["1", "2"]);
        let names: Vec<_> = main["1"].iter().map(|w| (w.kind, w.name.as_str())).collect();
        assert_eq!(
            names,
            vec![
                (WidgetKind::Button, "A"),
                (WidgetKind::Empty, ""),
                (WidgetKind::Button, "C")
            ]
        );
    }

    #[test]
    fn default_section_fills_presentation_keys() {
        let tree = tree_from(
            "[default]\nsink-icon = speaker\nsink-icon-alt = speaker_off\nbutton-color-bg = #222\n[sink Main]\nname = alsa_output.pci\nicon = headphones\n[button X]\n",
        );
        let main = tree.tab("").expect("tab");
        let sink = &main[""][0];
        assert_eq!(sink.prop("icon"), "headphones");
        assert_eq!(sink.prop("icon-alt"), "speaker_off");
        assert_eq!(sink.prop("name"), "alsa_output.pci");
        let button = &main[""][1];
        assert_eq!(button.prop("color-bg"), "#222");
        assert_eq!(button.prop("icon"), "");
    }

    #[test]
    fn loading_twice_yields_equal_trees() {
        let text = "[audio:sink Main]\nname = alsa_output.pci\n[1.button Play]\ncommand = echo hi\n";
        assert_eq!(tree_from(text), tree_from(text));
    }

    #[test]
    fn written_properties_survive_a_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("controldeck.conf");
        std::fs::write(
            &path,
            "[audio:sink Main]\ndescription = Speakers\nname = alsa_output.pci\n",
        )
        .expect("write");
        let first = build_widget_tree(&crate::config::load_config(Some(&path)).ini);

        std::fs::write(
            &path,
            "[audio:sink Main]\nname = alsa_output.pci\ndescription = Speakers\n",
        )
        .expect("rewrite");
        let second = build_widget_tree(&crate::config::load_config(Some(&path)).ini);

        let a = &first.tab("audio").expect("tab")[""][0];
        let b = &second.tab("audio").expect("tab")[""][0];
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.name, b.name);
        let mut left: Vec<_> = a.properties.iter().collect();
        let mut right: Vec<_> = b.properties.iter().collect();
        left.sort();
        right.sort();
        assert_eq!(left, right);
        assert_eq!(b.prop("icon"), "");
    }

    #[test]
    fn widget_id_round_trips_through_text() {
        let id: WidgetId = "2-0-5".parse().expect("id");
        assert_eq!(
            id,
            WidgetId {
                tab: 2,
                section: 0,
                index: 5
            }
        );
        assert_eq!(id.to_string(), "2-0-5");
        assert!("1-2".parse::<WidgetId>().is_err());
        assert!("a-b-c".parse::<WidgetId>().is_err());
    }
}
