//! Adapter over pactl's human-readable listing.

use std::sync::OnceLock;

use controldeck_core::{CommandLine, CommandRunner};
use regex::Regex;
use tracing::debug;

use super::{is_connection_failure, parse_percent, AudioNode, NodeKind, VolumeControl};

/// Reads the plain `pactl list <noun>` listing for pactl builds without JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct PactlText;

struct Patterns {
    header: Regex,
    field: Regex,
    property: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        header: Regex::new(r"^(?:Sink|Source|Sink Input) #(\d+)\s*$")
            .expect("header pattern is a valid regex"),
        field: Regex::new(r"^\s+(Name|Description|Mute|Volume):\s*(.*)$")
            .expect("field pattern is a valid regex"),
        property: Regex::new(r#"^\s+([A-Za-z0-9_.\-]+) = "(.*)"\s*$"#)
            .expect("property pattern is a valid regex"),
    })
}

impl VolumeControl for PactlText {
    fn name(&self) -> &'static str {
        "pactl-text"
    }

    fn list(&self, runner: &dyn CommandRunner, kind: NodeKind) -> Vec<AudioNode> {
        // Field labels are localized; force the C locale.
        let output = runner.probe(&CommandLine::args([
            "env",
            "LC_ALL=C",
            "pactl",
            "list",
            kind.list_noun(),
        ]));
        parse_listing(&output)
    }
}

fn parse_listing(output: &str) -> Vec<AudioNode> {
    if output.is_empty() || is_connection_failure(output) {
        debug!("no pactl output");
        return Vec::new();
    }
    let patterns = patterns();
    let mut nodes = Vec::new();
    let mut current: Option<AudioNode> = None;
    for line in output.lines() {
        if let Some(caps) = patterns.header.captures(line) {
            nodes.extend(current.take());
            current = Some(AudioNode {
                index: caps[1].parse().unwrap_or_default(),
                ..AudioNode::default()
            });
            continue;
        }
        let Some(node) = current.as_mut() else {
            continue;
        };
        if let Some(caps) = patterns.field.captures(line) {
            let value = caps[2].trim();
            match &caps[1] {
                "Name" => node.name = value.to_string(),
                "Description" => node.description = value.to_string(),
                "Mute" => node.muted = value.eq_ignore_ascii_case("yes"),
                "Volume" => node.volume_percent = parse_percent(value).unwrap_or(0.0),
                _ => {}
            }
        } else if let Some(caps) = patterns.property.captures(line) {
            node.properties
                .insert(caps[1].to_string(), caps[2].to_string());
        }
    }
    nodes.extend(current);
    nodes
}
