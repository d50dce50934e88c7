//! Audio device state behind a volume-control capability.
//!
//! Two adapters read the same pactl data: `PactlJson` uses the structured
//! `-f json` output, `PactlText` parses the human-readable listing for older
//! pactl builds.

mod audio_cache;
mod audio_json;
mod audio_text;

use controldeck_core::{AudioBackendPreference, CommandLine, CommandRunner, WidgetKind};
use indexmap::IndexMap;
use tracing::{debug, info};

pub use audio_cache::{AudioStateCache, Clock, SystemClock};
pub use audio_json::PactlJson;
pub use audio_text::PactlText;

/// First pactl release with `--format=json`.
const PACTL_JSON_MAJOR: u32 = 16;

const APP_LABEL_KEYS: [&str; 3] = [
    "application.process.binary",
    "application.name",
    "node.name",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Sink,
    Source,
    SinkInput,
}

impl NodeKind {
    pub fn from_widget(kind: WidgetKind) -> Option<Self> {
        match kind {
            WidgetKind::Sink => Some(NodeKind::Sink),
            WidgetKind::Source => Some(NodeKind::Source),
            WidgetKind::SinkInput | WidgetKind::SinkInputs => Some(NodeKind::SinkInput),
            _ => None,
        }
    }

    /// Object name used by `pactl set-<noun>-volume`.
    pub fn pactl_noun(self) -> &'static str {
        match self {
            NodeKind::Sink => "sink",
            NodeKind::Source => "source",
            NodeKind::SinkInput => "sink-input",
        }
    }

    /// Object name used by `pactl list <noun>`.
    pub fn list_noun(self) -> &'static str {
        match self {
            NodeKind::Sink => "sinks",
            NodeKind::Source => "sources",
            NodeKind::SinkInput => "sink-inputs",
        }
    }
}

/// One sink, source or playback stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioNode {
    pub index: u32,
    pub name: String,
    pub description: String,
    pub muted: bool,
    pub volume_percent: f64,
    pub properties: IndexMap<String, String>,
}

impl AudioNode {
    /// `app: media` label for a playback stream.
    pub fn stream_label(&self) -> String {
        let app = APP_LABEL_KEYS
            .iter()
            .filter_map(|key| self.properties.get(*key))
            .find(|value| !value.is_empty());
        let media = self
            .properties
            .get("media.name")
            .filter(|value| !value.is_empty());
        match (app, media) {
            (Some(app), Some(media)) => format!("{app}: {media}"),
            (Some(app), None) => app.clone(),
            (None, Some(media)) => media.clone(),
            (None, None) if !self.description.is_empty() => self.description.clone(),
            (None, None) => format!("#{}", self.index),
        }
    }
}

/// Everything the deck reads from the audio server in one refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSnapshot {
    pub sinks: Vec<AudioNode>,
    pub sources: Vec<AudioNode>,
    pub sink_inputs: Vec<AudioNode>,
}

impl AudioSnapshot {
    fn nodes_mut(&mut self, kind: NodeKind) -> &mut Vec<AudioNode> {
        match kind {
            NodeKind::Sink => &mut self.sinks,
            NodeKind::Source => &mut self.sources,
            NodeKind::SinkInput => &mut self.sink_inputs,
        }
    }

    /// Sinks and sources match by name, streams by index.
    pub fn find(&self, kind: NodeKind, key: &str) -> Option<&AudioNode> {
        match kind {
            NodeKind::Sink => self.sinks.iter().find(|node| node.name == key),
            NodeKind::Source => self.sources.iter().find(|node| node.name == key),
            NodeKind::SinkInput => {
                let index: u32 = key.trim().parse().ok()?;
                self.sink_inputs.iter().find(|node| node.index == index)
            }
        }
    }
}

/// Read and change volume on the system audio server.
pub trait VolumeControl: Send {
    fn name(&self) -> &'static str;

    /// Query sinks, sources and streams. Never fails; unreachable servers
    /// produce empty lists.
    fn snapshot(&self, runner: &dyn CommandRunner) -> AudioSnapshot {
        let mut snapshot = AudioSnapshot::default();
        for kind in [NodeKind::Sink, NodeKind::Source, NodeKind::SinkInput] {
            *snapshot.nodes_mut(kind) = self.list(runner, kind);
        }
        snapshot
    }

    fn list(&self, runner: &dyn CommandRunner, kind: NodeKind) -> Vec<AudioNode>;

    fn mute_toggle_command(&self, kind: NodeKind, name: &str) -> CommandLine {
        CommandLine::args([
            "pactl".to_string(),
            format!("set-{}-mute", kind.pactl_noun()),
            name.to_string(),
            "toggle".to_string(),
        ])
    }

    fn set_volume_command(&self, kind: NodeKind, name: &str, percent: f64) -> CommandLine {
        CommandLine::args([
            "pactl".to_string(),
            format!("set-{}-volume", kind.pactl_noun()),
            name.to_string(),
            format!("{percent:.0}%"),
        ])
    }
}

/// Pick the adapter from the configured preference or the installed pactl.
pub fn select_backend(
    preference: AudioBackendPreference,
    runner: &dyn CommandRunner,
) -> Box<dyn VolumeControl> {
    let use_json = match preference {
        AudioBackendPreference::Json => true,
        AudioBackendPreference::Text => false,
        AudioBackendPreference::Auto => {
            let version = runner.probe(&CommandLine::args(["pactl", "--version"]));
            let major = parse_pactl_major(&version);
            debug!(?major, "detected pactl version");
            major.map(|major| major >= PACTL_JSON_MAJOR).unwrap_or(false)
        }
    };
    let backend: Box<dyn VolumeControl> = if use_json {
        Box::new(PactlJson)
    } else {
        Box::new(PactlText)
    };
    info!(backend = backend.name(), %preference, "audio backend selected");
    backend
}

fn parse_pactl_major(version: &str) -> Option<u32> {
    // First line looks like `pactl 16.1`.
    let line = version.lines().next()?;
    let number = line.split_whitespace().nth(1)?;
    number.split('.').next()?.parse().ok()
}

/// pactl reports an unreachable server as `Connection failure: ...`.
fn is_connection_failure(output: &str) -> bool {
    output.trim_start().starts_with("Connection failure")
}

fn parse_percent(text: &str) -> Option<f64> {
    let end = text.find('%')?;
    let start = text[..end]
        .rfind(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .map(|idx| idx + 1)
        .unwrap_or(0);
    text[start..end].parse().ok()
}
