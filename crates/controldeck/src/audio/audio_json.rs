//! Adapter over pactl's JSON listing.

use controldeck_core::{CommandLine, CommandRunner};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{is_connection_failure, parse_percent, AudioNode, NodeKind, VolumeControl};

/// Reads `pactl -f json list <noun>` (pactl 16 and later).
#[derive(Debug, Clone, Copy, Default)]
pub struct PactlJson;

#[derive(Debug, Deserialize)]
struct PactlEntry {
    index: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    mute: bool,
    #[serde(default)]
    volume: IndexMap<String, PactlChannel>,
    #[serde(default)]
    properties: IndexMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PactlChannel {
    #[serde(default)]
    value_percent: String,
}

impl VolumeControl for PactlJson {
    fn name(&self) -> &'static str {
        "pactl-json"
    }

    fn list(&self, runner: &dyn CommandRunner, kind: NodeKind) -> Vec<AudioNode> {
        let output = runner.probe(&CommandLine::args([
            "pactl",
            "-f",
            "json",
            "list",
            kind.list_noun(),
        ]));
        parse_nodes(&output, kind)
    }
}

fn parse_nodes(output: &str, kind: NodeKind) -> Vec<AudioNode> {
    if output.is_empty() || is_connection_failure(output) {
        debug!(list = kind.list_noun(), "no pactl output");
        return Vec::new();
    }
    let entries: Vec<PactlEntry> = match serde_json::from_str(output) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(list = kind.list_noun(), %err, "pactl json output unreadable");
            return Vec::new();
        }
    };
    entries.into_iter().map(into_node).collect()
}

fn into_node(entry: PactlEntry) -> AudioNode {
    // Channels are reported individually; the first one stands for the node.
    let volume_percent = entry
        .volume
        .values()
        .next()
        .and_then(|channel| parse_percent(&channel.value_percent))
        .unwrap_or(0.0);
    let properties = entry
        .properties
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();
    AudioNode {
        index: entry.index,
        name: entry.name,
        description: entry.description,
        muted: entry.mute,
        volume_percent,
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;

    const SINKS: &str = r#"[{"index":56,"state":"SUSPENDED","name":"alsa_output.pci-0000_00_1f.3.analog-stereo","description":"Built-in Audio Analog Stereo","driver":"PipeWire","mute":false,"volume":{"front-left":{"value":30802,"value_percent":"47%","db":"-19.68 dB"},"front-right":{"value":30802,"value_percent":"47%","db":"-19.68 dB"}},"balance":0.0,"properties":{"device.api":"alsa","object.serial":"57"}}]"#;

    const STREAMS: &str = r#"[{"index":112,"driver":"PipeWire","sink":56,"mute":true,"volume":{"mono":{"value":65536,"value_percent":"100%","db":"0.00 dB"}},"properties":{"application.name":"Firefox","application.process.binary":"firefox","media.name":"AudioStream"}}]"#;

    #[test]
    fn sinks_are_parsed_with_first_channel_volume() {
        let nodes = parse_nodes(SINKS, NodeKind::Sink);
        assert_eq!(nodes.len(), 1);
        let sink = &nodes[0];
        assert_eq!(sink.index, 56);
        assert_eq!(sink.name, "alsa_output.pci-0000_00_1f.3.analog-stereo");
        assert_eq!(sink.description, "Built-in Audio Analog Stereo");
        assert!(!sink.muted);
        assert_eq!(sink.volume_percent, 47.0);
        assert_eq!(sink.properties.get("object.serial").map(String::as_str), Some("57"));
    }

    #[test]
    fn streams_without_names_are_kept() {
        let nodes = parse_nodes(STREAMS, NodeKind::SinkInput);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "");
        assert!(nodes[0].muted);
        assert_eq!(nodes[0].stream_label(), "firefox: AudioStream");
    }

    #[test]
    fn failure_in_a_media_name_keeps_the_stream() {
        let output = r#"[{"index":5,"mute":false,"volume":{"mono":{"value_percent":"80%"}},"properties":{"application.name":"mpv","media.name":"Linkin Park - Failure"}}]"#;
        let nodes = parse_nodes(output, NodeKind::SinkInput);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].stream_label(), "mpv: Linkin Park - Failure");
    }

    #[test]
    fn unreachable_server_yields_empty_lists() {
        assert!(parse_nodes("Connection failure: Connection refused", NodeKind::Sink).is_empty());
        assert!(parse_nodes("", NodeKind::Source).is_empty());
        assert!(parse_nodes("{not json", NodeKind::Source).is_empty());
    }

    #[test]
    fn snapshot_queries_each_list() {
        let runner = RecordingRunner::default()
            .with_probe("pactl -f json list sinks", SINKS)
            .with_probe("pactl -f json list sink-inputs", STREAMS);
        let snapshot = PactlJson.snapshot(&runner);
        assert_eq!(snapshot.sinks.len(), 1);
        assert!(snapshot.sources.is_empty());
        assert_eq!(snapshot.sink_inputs.len(), 1);
        assert_eq!(runner.probes().len(), 3);
    }
}
