//! Runtime behavior of interactive widgets: state probes, click handling,
//! slider values and volume commands.

use std::sync::OnceLock;

use controldeck_core::{CommandLine, CommandRunner, WidgetDescriptor, WidgetKind};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::audio::{AudioNode, AudioSnapshot, NodeKind, VolumeControl};

pub const VOLUME_STEP: f64 = 5.0;

/// What the page shows for a button.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ButtonState {
    /// The alternate look (and `command-alt` on the next click) is active.
    pub alt: bool,
    /// Output of `state-command`, empty when unknown.
    pub state: String,
}

fn has_state_probe(widget: &WidgetDescriptor) -> bool {
    widget.prop_opt("state-command").is_some()
}

/// Probe a button's state. Without `state-command` the caller's view of the
/// toggle is kept.
pub fn button_state(
    runner: &dyn CommandRunner,
    widget: &WidgetDescriptor,
    client_alt: bool,
) -> ButtonState {
    let Some(state_command) = widget.prop_opt("state-command") else {
        return ButtonState {
            alt: client_alt,
            state: String::new(),
        };
    };
    let state = runner.probe(&CommandLine::shell(state_command));
    let alt = if let Some(pattern) = widget.prop_opt("state-alt") {
        let output = match widget.prop_opt("state-command-alt") {
            Some(command) => runner.probe(&CommandLine::shell(command)),
            None => state.clone(),
        };
        state_matches(pattern, &output)
    } else if let Some(pattern) = widget.prop_opt("state") {
        !state_matches(pattern, &state)
    } else {
        false
    };
    ButtonState { alt, state }
}

/// Run the command for the current state, then report the state after the click.
pub fn click_button(
    runner: &dyn CommandRunner,
    widget: &WidgetDescriptor,
    client_alt: bool,
) -> ButtonState {
    let before = button_state(runner, widget, client_alt);
    let command = if before.alt {
        widget
            .prop_opt("command-alt")
            .or_else(|| widget.prop_opt("command"))
    } else {
        widget.prop_opt("command")
    };
    match command {
        Some(command) => runner.spawn(&CommandLine::shell(command)),
        None => debug!(widget = %widget.name, "button has no command"),
    }
    if has_state_probe(widget) {
        return button_state(runner, widget, before.alt);
    }
    // Without a probe the button flips only when it has somewhere to flip to.
    ButtonState {
        alt: widget.prop_opt("command-alt").is_some() && !before.alt,
        state: String::new(),
    }
}

/// Full-output match against a state pattern; invalid patterns compare literally.
pub fn state_matches(pattern: &str, output: &str) -> bool {
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(regex) => regex.is_match(output.trim()),
        Err(err) => {
            debug!(pattern, %err, "state pattern is not a regex, comparing literally");
            pattern == output.trim()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl SliderRange {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

pub fn slider_range(widget: &WidgetDescriptor) -> SliderRange {
    let number = |key: &str, default: f64| {
        let Some(raw) = widget.prop_opt(key) else {
            return default;
        };
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                warn!(widget = %widget.name, key, value = raw, "invalid slider bound");
                default
            }
        }
    };
    let mut min = number("min", 0.0);
    let mut max = number("max", 100.0);
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    let step = number("step", 1.0);
    SliderRange {
        min,
        max,
        step: if step > 0.0 { step } else { 1.0 },
    }
}

/// Initial slider position: the number in `state-command` output, else `min`.
pub fn slider_value(
    runner: &dyn CommandRunner,
    widget: &WidgetDescriptor,
    range: SliderRange,
) -> f64 {
    widget
        .prop_opt("state-command")
        .map(|command| runner.probe(&CommandLine::shell(command)))
        .and_then(|output| parse_numeric(&output, range.min, range.max))
        .unwrap_or(range.min)
}

pub fn slider_command(widget: &WidgetDescriptor, value: f64) -> Option<CommandLine> {
    widget
        .prop_opt("command")
        .map(|template| CommandLine::shell(template.replace("{value}", &format_number(value))))
}

/// Integral values print without a fraction (`47`, not `47.0`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

struct Token {
    value: f64,
    raw: String,
    percent: bool,
}

fn numeric_tokens(text: &str) -> Vec<Token> {
    let mut current = String::new();
    let mut tokens = Vec::new();
    let mut push = |current: &mut String, percent: bool| {
        if current.is_empty() {
            return;
        }
        if let Ok(value) = current.parse::<f64>() {
            tokens.push(Token {
                value,
                raw: current.clone(),
                percent,
            });
        }
        current.clear();
    };
    for ch in text.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            current.push(ch);
            continue;
        }
        push(&mut current, ch == '%');
    }
    push(&mut current, false);
    tokens
}

/// Pick the last percentage in `text`, else its last number, clamped to range.
pub fn parse_numeric(text: &str, min: f64, max: f64) -> Option<f64> {
    let tokens = numeric_tokens(text);
    let token = tokens
        .iter()
        .rev()
        .find(|token| token.percent)
        .or_else(|| tokens.last())?;
    Some(token.value.clamp(min, max))
}

/// Like [`parse_numeric`] for volume output; ratios such as wpctl's
/// `Volume: 0.47` are scaled to percent.
pub fn parse_volume(text: &str) -> Option<f64> {
    let tokens = numeric_tokens(text);
    let token = tokens
        .iter()
        .rev()
        .find(|token| token.percent)
        .or_else(|| tokens.last())?;
    let mut value = token.value;
    if !token.percent && token.raw.contains('.') && value <= 5.0 {
        value *= 100.0;
    }
    Some(value.clamp(0.0, 100.0))
}

pub fn parse_muted(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("muted") || lower.contains("mute: yes")
}

/// Everything needed to draw and drive one volume slider.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeView {
    pub kind: NodeKind,
    /// Node name for sinks and sources, stream index for streams.
    pub target: String,
    pub label: String,
    pub value: f64,
    pub muted: bool,
    pub stream: Option<u32>,
    pub icon: String,
    pub icon_alt: String,
    /// Whether `image` / `image-alt` are configured; served by `/image`.
    pub image: bool,
    pub image_alt: bool,
}

fn default_icons(kind: NodeKind) -> (&'static str, &'static str) {
    match kind {
        NodeKind::Source => ("mic", "mic_off"),
        NodeKind::Sink | NodeKind::SinkInput => ("volume_up", "volume_mute"),
    }
}

fn icons_for(widget: &WidgetDescriptor, kind: NodeKind) -> (String, String) {
    let (icon, icon_alt) = default_icons(kind);
    (
        widget.prop_opt("icon").unwrap_or(icon).to_string(),
        widget.prop_opt("icon-alt").unwrap_or(icon_alt).to_string(),
    )
}

fn images_for(widget: &WidgetDescriptor) -> (bool, bool) {
    (
        widget.prop_opt("image").is_some(),
        widget.prop_opt("image-alt").is_some(),
    )
}

/// Node the widget controls: the `name` property, else the widget name.
pub fn volume_target(widget: &WidgetDescriptor) -> &str {
    widget.prop_opt("name").unwrap_or(widget.name.trim())
}

/// Resolve a `sink`, `source` or `sink-input` widget against the snapshot.
pub fn volume_view(
    runner: &dyn CommandRunner,
    snapshot: &AudioSnapshot,
    widget: &WidgetDescriptor,
) -> Option<VolumeView> {
    let kind = NodeKind::from_widget(widget.kind)?;
    if widget.kind == WidgetKind::SinkInputs {
        return None;
    }
    let target = volume_target(widget).to_string();
    let node = snapshot.find(kind, &target);
    let probed = widget
        .prop_opt("state-command")
        .map(|command| runner.probe(&CommandLine::shell(command)));
    let value = probed
        .as_deref()
        .and_then(parse_volume)
        .or_else(|| node.map(|node| node.volume_percent))
        .unwrap_or(0.0);
    let muted = match (node, probed.as_deref()) {
        (Some(node), _) => node.muted,
        (None, Some(output)) => parse_muted(output),
        (None, None) => false,
    };
    let label = match (widget.prop_opt("description"), node) {
        (Some(description), _) => description.to_string(),
        (None, Some(node)) if kind == NodeKind::SinkInput => node.stream_label(),
        _ => widget.name.clone(),
    };
    let stream = (kind == NodeKind::SinkInput)
        .then(|| target.parse().ok())
        .flatten();
    let (icon, icon_alt) = icons_for(widget, kind);
    let (image, image_alt) = images_for(widget);
    Some(VolumeView {
        kind,
        target,
        label,
        value,
        muted,
        stream,
        icon,
        icon_alt,
        image,
        image_alt,
    })
}

/// One view per active playback stream for a `sink-inputs` widget.
pub fn stream_views(snapshot: &AudioSnapshot, widget: &WidgetDescriptor) -> Vec<VolumeView> {
    let (icon, icon_alt) = icons_for(widget, NodeKind::SinkInput);
    let (image, image_alt) = images_for(widget);
    snapshot
        .sink_inputs
        .iter()
        .map(|node: &AudioNode| VolumeView {
            kind: NodeKind::SinkInput,
            target: node.index.to_string(),
            label: node.stream_label(),
            value: node.volume_percent,
            muted: node.muted,
            stream: Some(node.index),
            icon: icon.clone(),
            icon_alt: icon_alt.clone(),
            image,
            image_alt,
        })
        .collect()
}

/// `command-alt` (with `{name}`) overrides the adapter's mute toggle.
pub fn volume_mute_command(
    backend: &dyn VolumeControl,
    widget: &WidgetDescriptor,
    kind: NodeKind,
    target: &str,
) -> CommandLine {
    match widget.prop_opt("command-alt") {
        Some(template) => CommandLine::shell(template.replace("{name}", target)),
        None => backend.mute_toggle_command(kind, target),
    }
}

/// `command` (with `{name}` and `{value}`) overrides the adapter's volume command.
pub fn volume_set_command(
    backend: &dyn VolumeControl,
    widget: &WidgetDescriptor,
    kind: NodeKind,
    target: &str,
    value: f64,
) -> CommandLine {
    match widget.prop_opt("command") {
        Some(template) => CommandLine::shell(
            template
                .replace("{name}", target)
                .replace("{value}", &format_number(value)),
        ),
        None => backend.set_volume_command(kind, target, value),
    }
}

/// Snap a requested volume onto the slider grid.
pub fn snap_volume(value: f64) -> f64 {
    ((value / VOLUME_STEP).round() * VOLUME_STEP).clamp(0.0, 100.0)
}

/// Named CSS colors, hex and `rgb()`/`hsl()` forms; anything else is dropped.
pub fn is_css_color(value: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(?:#(?:[0-9a-fA-F]{3,4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})|[a-zA-Z]+|(?:rgb|rgba|hsl|hsla)\([0-9.,%\s]+\))$",
            )
            .expect("color pattern is a valid regex")
        })
        .is_match(value.trim())
}
