//! HTML page for the deck.

pub mod html;
mod widgets;

use controldeck_core::{CommandRunner, WidgetId, WidgetTree};
use serde_json::json;

use self::html::{attr, capitalize, escape};
use crate::audio::AudioSnapshot;

pub use widgets::render_widget;

pub const ALL_TABS: &str = "[all]";
pub const EMPTY_PLACEHOLDER: &str = "add elements in controldeck.conf";

const DECK_CSS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/deck.css"));
const DECK_JS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/deck.js"));

/// State sources the widgets read while rendering.
pub struct LiveState<'a> {
    pub runner: &'a dyn CommandRunner,
    pub audio: &'a AudioSnapshot,
}

/// Query parameters of the page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub tab: Option<String>,
    /// Opened by the desktop launcher; shows the close button.
    pub gui: bool,
    pub pid: Option<u32>,
}

impl PageQuery {
    /// The tab to show, falling back to all tabs for unknown names.
    fn selected_tab<'a>(&'a self, tree: &WidgetTree) -> &'a str {
        match self.tab.as_deref() {
            Some(tab) if tree.tab(tab).is_some() => tab,
            _ => ALL_TABS,
        }
    }
}

fn tab_toggle(out: &mut String, name: &str, selected: &str) {
    let (content, title) = match name {
        ALL_TABS => (
            "<span class=\"material-icons\">brightness_auto</span>".to_string(),
            "all",
        ),
        "" => (
            "<span class=\"material-icons\">radio_button_unchecked</span>".to_string(),
            "main",
        ),
        other => (escape(&capitalize(other)), other),
    };
    let class = if name == selected {
        "deck-tab deck-active"
    } else {
        "deck-tab"
    };
    out.push_str(&format!(
        "<button type=\"button\" class=\"{class}\"{}{}>{content}</button>",
        attr("data-tab", name),
        attr("title", title),
    ));
}

fn tool(out: &mut String, action: &str, icon: &str, title: &str) {
    out.push_str(&format!(
        "<button type=\"button\" class=\"deck-tool\"{}{}><span class=\"material-icons\">{icon}</span></button>",
        attr("data-action", action),
        attr("title", title),
    ));
}

fn toolbar(out: &mut String, tree: &WidgetTree, query: &PageQuery, selected: &str) {
    out.push_str("<header class=\"deck-toolbar\"><nav class=\"deck-tabs\">");
    tab_toggle(out, ALL_TABS, selected);
    for (name, _) in tree.tabs() {
        tab_toggle(out, name, selected);
    }
    out.push_str("</nav><div class=\"deck-tools\">");
    tool(out, "config", "settings", "Edit configuration");
    tool(out, "fullscreen", "fullscreen", "Toggle fullscreen");
    tool(out, "theme", "dark_mode", "Toggle dark mode");
    tool(out, "reload", "refresh", "Reload configuration");
    if query.gui {
        tool(out, "close", "close", "Close window");
    }
    out.push_str("</div></header>");
}

fn panels(out: &mut String, tree: &WidgetTree, live: &LiveState, selected: &str) {
    out.push_str("<main class=\"deck-panels\">");
    if tree.is_empty() {
        out.push_str(&format!(
            "<p class=\"deck-placeholder\">{}</p>",
            escape(EMPTY_PLACEHOLDER)
        ));
    }
    for (tab_index, (name, sections)) in tree.tabs().enumerate() {
        let hidden = if selected == ALL_TABS || selected == name {
            ""
        } else {
            " hidden"
        };
        out.push_str(&format!(
            "<section class=\"deck-panel\"{}{hidden}>",
            attr("data-tab", name)
        ));
        for (section_index, (section, widgets)) in sections.iter().enumerate() {
            out.push_str(&format!(
                "<div class=\"deck-row\"{}>",
                attr("data-section", section)
            ));
            for (index, widget) in widgets.iter().enumerate() {
                let id = WidgetId {
                    tab: tab_index,
                    section: section_index,
                    index,
                };
                render_widget(out, id, widget, live);
            }
            out.push_str("</div>");
        }
        out.push_str("</section>");
    }
    out.push_str("</main>");
}

const CONFIG_DIALOG: &str = "<dialog id=\"deck-config\"><form method=\"dialog\" class=\"deck-config-form\">\
<textarea id=\"deck-config-text\" spellcheck=\"false\"></textarea>\
<div class=\"deck-config-actions\"><span id=\"deck-config-status\"></span>\
<button type=\"button\" data-action=\"config-save\">Save</button>\
<button value=\"cancel\">Close</button></div></form></dialog>";

/// Render the full page for the current tree.
pub fn render_page(tree: &WidgetTree, query: &PageQuery, live: &LiveState) -> String {
    let selected = query.selected_tab(tree);
    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">");
    out.push_str("<title>ControlDeck</title>");
    out.push_str("<link rel=\"stylesheet\" href=\"https://fonts.googleapis.com/icon?family=Material+Icons\">");
    out.push_str(&format!("<style>{DECK_CSS}</style></head><body class=\"deck-dark\">"));
    toolbar(&mut out, tree, query, selected);
    panels(&mut out, tree, live, selected);
    out.push_str(CONFIG_DIALOG);
    let page = json!({ "gui": query.gui, "pid": query.pid, "tab": selected });
    out.push_str(&format!(
        "<script>window.DECK = {page};</script><script>{DECK_JS}</script></body></html>"
    ));
    out
}
