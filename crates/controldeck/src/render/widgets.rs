//! One HTML constructor per widget kind.

use controldeck_core::{WidgetDescriptor, WidgetId, WidgetKind};

use super::html::{attr, attr_opt, escape};
use super::LiveState;
use crate::controls::{
    self, button_state, format_number, slider_range, slider_value, stream_views, volume_view,
    ButtonState, VolumeView, VOLUME_STEP,
};

pub fn render_widget(out: &mut String, id: WidgetId, widget: &WidgetDescriptor, live: &LiveState) {
    match widget.kind {
        WidgetKind::Empty => empty(out),
        WidgetKind::Label => label(out, widget),
        WidgetKind::Button => {
            let state = button_state(live.runner, widget, false);
            button(out, id, widget, &state);
        }
        WidgetKind::Slider => slider(out, id, widget, live),
        WidgetKind::Sink | WidgetKind::Source | WidgetKind::SinkInput => {
            if let Some(view) = volume_view(live.runner, live.audio, widget) {
                volume(out, id, &view);
            }
        }
        WidgetKind::SinkInputs => {
            for view in stream_views(live.audio, widget) {
                volume(out, id, &view);
            }
        }
    }
}

fn empty(out: &mut String) {
    out.push_str("<div class=\"deck-widget deck-empty\" aria-hidden=\"true\"></div>");
}

fn label(out: &mut String, widget: &WidgetDescriptor) {
    out.push_str(&format!(
        "<div class=\"deck-widget deck-label\">{}</div>",
        escape(&widget.display_name().to_uppercase())
    ));
}

fn image_url(id: WidgetId, alt: bool) -> String {
    format!("/image?id={id}&alt={}", u8::from(alt))
}

/// Image routes for the normal and alt state; a missing alt image reuses the
/// normal one.
fn image_urls(id: WidgetId, image: bool, image_alt: bool) -> (String, String) {
    let normal = if image {
        image_url(id, false)
    } else {
        String::new()
    };
    let alt = if image_alt {
        image_url(id, true)
    } else {
        normal.clone()
    };
    (normal, alt)
}

fn color_style(widget: &WidgetDescriptor) -> String {
    let mut style = String::new();
    if let Some(bg) = widget.prop_opt("color-bg").filter(|c| controls::is_css_color(c)) {
        style.push_str(&format!("background-color:{};", bg.trim()));
    }
    if let Some(fg) = widget.prop_opt("color-fg").filter(|c| controls::is_css_color(c)) {
        style.push_str(&format!("color:{};", fg.trim()));
    }
    style
}

fn icon_markup(icon: &str, image: &str) -> String {
    if !image.is_empty() {
        format!("<img class=\"deck-image\" src=\"{}\" alt=\"\">", escape(image))
    } else if !icon.is_empty() {
        format!("<span class=\"material-icons\">{}</span>", escape(icon))
    } else {
        String::new()
    }
}

fn button(out: &mut String, id: WidgetId, widget: &WidgetDescriptor, state: &ButtonState) {
    let text = widget.display_name();
    let text_alt = widget.prop_opt("text-alt").unwrap_or(text);
    let icon = widget.prop("icon");
    let icon_alt = widget.prop_opt("icon-alt").unwrap_or(icon);
    let (image, image_alt) = image_urls(
        id,
        widget.prop_opt("image").is_some(),
        widget.prop_opt("image-alt").is_some(),
    );
    let (shown_text, shown_icon, shown_image) = if state.alt {
        (text_alt, icon_alt, image_alt.as_str())
    } else {
        (text, icon, image.as_str())
    };
    let class = if state.alt {
        "deck-widget deck-button deck-alt"
    } else {
        "deck-widget deck-button"
    };
    out.push_str(&format!(
        "<button type=\"button\" class=\"{class}\"{}{}{}{}{}{}{}{}{}{}{}>",
        attr("data-id", &id.to_string()),
        attr("data-alt", if state.alt { "1" } else { "0" }),
        attr("data-text", text),
        attr("data-text-alt", text_alt),
        attr("data-icon", icon),
        attr("data-icon-alt", icon_alt),
        attr("data-image", &image),
        attr("data-image-alt", &image_alt),
        attr_opt("data-state", &state.state),
        attr_opt("title", widget.prop("command").trim()),
        attr_opt("style", &color_style(widget)),
    ));
    out.push_str(&format!(
        "<span class=\"deck-icon\">{}</span><span class=\"deck-text\">{}</span></button>",
        icon_markup(shown_icon, shown_image),
        escape(shown_text)
    ));
}

fn slider(out: &mut String, id: WidgetId, widget: &WidgetDescriptor, live: &LiveState) {
    let range = slider_range(widget);
    let value = slider_value(live.runner, widget, range);
    out.push_str(&format!(
        "<div class=\"deck-widget deck-slider\"{}{}><span class=\"deck-slider-label\">{}</span>",
        attr("data-id", &id.to_string()),
        attr_opt("title", widget.prop("command").trim()),
        escape(widget.display_name()),
    ));
    out.push_str(&format!(
        "<input type=\"range\"{}{}{}{}><span class=\"deck-slider-value\">{}</span></div>",
        attr("min", &format_number(range.min)),
        attr("max", &format_number(range.max)),
        attr("step", &format_number(range.step)),
        attr("value", &format_number(value)),
        escape(&format_number(value)),
    ));
}

fn volume(out: &mut String, id: WidgetId, view: &VolumeView) {
    let class = if view.muted {
        "deck-widget deck-volume deck-muted"
    } else {
        "deck-widget deck-volume"
    };
    let stream = view.stream.map(|index| index.to_string()).unwrap_or_default();
    out.push_str(&format!(
        "<div class=\"{class}\"{}{}{}><span class=\"deck-volume-label\"{}>{}</span>",
        attr("data-id", &id.to_string()),
        attr("data-kind", view.kind.pactl_noun()),
        attr_opt("data-stream", &stream),
        attr("title", &view.label),
        escape(&view.label),
    ));
    let (image, image_alt) = image_urls(id, view.image, view.image_alt);
    let (shown_icon, shown_image) = if view.muted {
        (&view.icon_alt, &image_alt)
    } else {
        (&view.icon, &image)
    };
    out.push_str(&format!(
        "<div class=\"deck-volume-controls\"><button type=\"button\" class=\"deck-mute\"{}{}{}{}><span class=\"deck-icon\">{}</span></button>",
        attr("data-icon", &view.icon),
        attr("data-icon-alt", &view.icon_alt),
        attr("data-image", &image),
        attr("data-image-alt", &image_alt),
        icon_markup(shown_icon, shown_image),
    ));
    let value = format_number(controls::snap_volume(view.value));
    out.push_str(&format!(
        "<input type=\"range\" min=\"0\" max=\"100\"{}{}><span class=\"deck-slider-value\">{}</span></div></div>",
        attr("step", &format_number(VOLUME_STEP)),
        attr("value", &value),
        escape(&value),
    ));
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::audio::AudioSnapshot;
    use crate::testing::RecordingRunner;

    const ID: WidgetId = WidgetId {
        tab: 0,
        section: 1,
        index: 2,
    };

    fn widget(kind: WidgetKind, name: &str, props: &[(&str, &str)]) -> WidgetDescriptor {
        WidgetDescriptor {
            kind,
            name: name.to_string(),
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<IndexMap<_, _>>(),
        }
    }

    fn render(widget: &WidgetDescriptor, runner: &RecordingRunner) -> String {
        let audio = AudioSnapshot::default();
        let live = LiveState {
            runner,
            audio: &audio,
        };
        let mut out = String::new();
        render_widget(&mut out, ID, widget, &live);
        out
    }

    #[test]
    fn label_is_upper_cased() {
        let html = render(
            &widget(WidgetKind::Label, "Now playing", &[]),
            &RecordingRunner::default(),
        );
        assert!(html.contains(">NOW PLAYING<"));
    }

    #[test]
    fn button_shows_command_tooltip_and_id() {
        let html = render(
            &widget(
                WidgetKind::Button,
                "Play",
                &[("command", "echo <hi>"), ("icon", "play_arrow")],
            ),
            &RecordingRunner::default(),
        );
        assert!(html.contains("data-id=\"0-1-2\""));
        assert!(html.contains("title=\"echo &lt;hi&gt;\""));
        assert!(html.contains("<span class=\"material-icons\">play_arrow</span>"));
        assert!(html.contains("<span class=\"deck-text\">Play</span>"));
    }

    #[test]
    fn alt_button_renders_alt_text() {
        let runner = RecordingRunner::default().with_probe("state", "on");
        let html = render(
            &widget(
                WidgetKind::Button,
                "Light",
                &[
                    ("state-command", "state"),
                    ("state-alt", "on"),
                    ("text-alt", "Lit"),
                ],
            ),
            &runner,
        );
        assert!(html.contains("deck-alt"));
        assert!(html.contains("<span class=\"deck-text\">Lit</span>"));
        assert!(html.contains("data-state=\"on\""));
    }

    #[test]
    fn invalid_colors_are_not_emitted() {
        let html = render(
            &widget(
                WidgetKind::Button,
                "X",
                &[("color-bg", "#222"), ("color-fg", "red;x:y")],
            ),
            &RecordingRunner::default(),
        );
        assert!(html.contains("style=\"background-color:#222;\""));
        assert!(!html.contains("red;x"));
    }

    #[test]
    fn image_buttons_point_at_image_route() {
        let html = render(
            &widget(WidgetKind::Button, "Stop", &[("image", "/usr/share/stop.svg")]),
            &RecordingRunner::default(),
        );
        assert!(html.contains("src=\"/image?id=0-1-2&amp;alt=0\""));
        assert!(!html.contains("/usr/share/stop.svg"));
    }

    #[test]
    fn slider_uses_range_and_probe() {
        let runner = RecordingRunner::default().with_probe("get", "30");
        let html = render(
            &widget(
                WidgetKind::Slider,
                "Brightness",
                &[("state-command", "get"), ("max", "50"), ("step", "2")],
            ),
            &runner,
        );
        assert!(html.contains("min=\"0\" max=\"50\" step=\"2\" value=\"30\""));
    }

    #[test]
    fn empty_sink_inputs_render_nothing() {
        let html = render(
            &widget(WidgetKind::SinkInputs, "", &[]),
            &RecordingRunner::default(),
        );
        assert!(html.is_empty());
    }

    #[test]
    fn volume_mute_button_shows_configured_image() {
        let html = render(
            &widget(
                WidgetKind::Sink,
                "Main",
                &[("image", "~/speaker.png"), ("image-alt", "~/speaker-off.png")],
            ),
            &RecordingRunner::default(),
        );
        assert!(html.contains("<img class=\"deck-image\" src=\"/image?id=0-1-2&amp;alt=0\""));
        assert!(html.contains("data-image-alt=\"/image?id=0-1-2&amp;alt=1\""));
        assert!(!html.contains(">volume_up</span>"));
        assert!(!html.contains("speaker.png"));
    }

    #[test]
    fn source_volume_uses_mic_icons() {
        let html = render(
            &widget(WidgetKind::Source, "alsa_input", &[]),
            &RecordingRunner::default(),
        );
        assert!(html.contains("data-kind=\"source\""));
        assert!(html.contains(">mic</span>"));
        assert!(html.contains("data-icon-alt=\"mic_off\""));
    }
}
