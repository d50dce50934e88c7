//! Deck state and request routing.
//!
//! Requests are handled one at a time under a single lock, so probes and the
//! audio cache need no further synchronization.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use controldeck_core::util::{expand_home, parse_flag};
use controldeck_core::{
    build_widget_tree, load_config, save_config_text, CommandLine, CommandRunner, Ini,
    LoadedConfig, WidgetDescriptor, WidgetId, WidgetKind, WidgetTree,
};
use tracing::{debug, info, warn};

use crate::audio::{AudioSnapshot, AudioStateCache, Clock, NodeKind, SystemClock, VolumeControl};
use crate::controls::{
    button_state, click_button, slider_command, slider_range, snap_volume, volume_mute_command,
    volume_set_command, volume_target,
};
use crate::http::{Method, Request, Response};
use crate::render::{render_page, LiveState, PageQuery};

const VOLUME_KINDS: &[WidgetKind] = &[
    WidgetKind::Sink,
    WidgetKind::Source,
    WidgetKind::SinkInput,
    WidgetKind::SinkInputs,
];
const IMAGE_KINDS: &[WidgetKind] = &[
    WidgetKind::Button,
    WidgetKind::Sink,
    WidgetKind::Source,
    WidgetKind::SinkInput,
    WidgetKind::SinkInputs,
];
const GUI_PROCESS_NAME: &str = "controldeck-gui";

type Handled = Result<Response, Response>;

pub struct Deck<C: Clock = SystemClock> {
    explicit_config: Option<PathBuf>,
    config_path: PathBuf,
    runner: Arc<dyn CommandRunner>,
    backend: Box<dyn VolumeControl>,
    audio: AudioStateCache<C>,
    tree: WidgetTree,
}

impl<C: Clock> Deck<C> {
    pub fn new(
        explicit_config: Option<PathBuf>,
        loaded: LoadedConfig,
        runner: Arc<dyn CommandRunner>,
        backend: Box<dyn VolumeControl>,
        audio: AudioStateCache<C>,
    ) -> Self {
        let tree = build_widget_tree(&loaded.ini);
        Self {
            explicit_config,
            config_path: loaded.path,
            runner,
            backend,
            audio,
            tree,
        }
    }

    pub fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Re-read the config file and rebuild the widget tree.
    pub fn reload(&mut self) {
        let loaded = load_config(self.explicit_config.as_deref());
        self.config_path = loaded.path;
        self.tree = build_widget_tree(&loaded.ini);
        debug!(
            path = %self.config_path.display(),
            widgets = self.tree.len(),
            "config reloaded"
        );
    }

    pub fn handle(&mut self, request: &Request) -> Response {
        let handled = match (request.path.as_str(), request.method) {
            ("/", Method::Get) => Ok(self.page(request)),
            ("/api/button", Method::Post) => self.click(request),
            ("/api/button", Method::Get) => self.button(request),
            ("/api/slider", Method::Post) => self.slider(request),
            ("/api/volume", Method::Post) => self.volume(request),
            ("/api/reload", Method::Post) => {
                self.reload();
                Ok(Response::ok())
            }
            ("/api/config", Method::Get) => self.read_config(),
            ("/api/config", Method::Post) => self.save_config(request),
            ("/api/close", Method::Post) => self.close(request),
            ("/api/widgets", Method::Get) => Ok(Response::json(&self.tree)),
            ("/image", Method::Get) => self.image(request),
            (
                "/" | "/api/button" | "/api/slider" | "/api/volume" | "/api/reload"
                | "/api/config" | "/api/close" | "/api/widgets" | "/image",
                _,
            ) => Err(Response::method_not_allowed()),
            _ => Err(Response::not_found()),
        };
        handled.unwrap_or_else(|response| response)
    }

    fn page(&mut self, request: &Request) -> Response {
        self.reload();
        let query = PageQuery {
            tab: request.query_value("tab").map(str::to_ascii_lowercase),
            gui: request.has_query("gui"),
            pid: request.query_value("pid").and_then(|pid| pid.parse().ok()),
        };
        let needs_audio = self
            .tree
            .tabs()
            .flat_map(|(_, sections)| sections.values())
            .flatten()
            .any(|widget| widget.kind.is_volume());
        let silent = AudioSnapshot::default();
        let audio = if needs_audio {
            self.audio
                .snapshot(self.backend.as_ref(), self.runner.as_ref())
        } else {
            &silent
        };
        let live = LiveState {
            runner: self.runner.as_ref(),
            audio,
        };
        Response::html(render_page(&self.tree, &query, &live))
    }

    fn click(&self, request: &Request) -> Handled {
        let widget = lookup(&self.tree, request, &[WidgetKind::Button])?;
        let state = click_button(self.runner.as_ref(), widget, alt_flag(request));
        Ok(Response::json(&state))
    }

    fn button(&self, request: &Request) -> Handled {
        let widget = lookup(&self.tree, request, &[WidgetKind::Button])?;
        let state = button_state(self.runner.as_ref(), widget, alt_flag(request));
        Ok(Response::json(&state))
    }

    fn slider(&self, request: &Request) -> Handled {
        let widget = lookup(&self.tree, request, &[WidgetKind::Slider])?;
        let value = number_param(request, "value")?;
        let value = slider_range(widget).clamp(value);
        match slider_command(widget, value) {
            Some(command) => self.runner.spawn(&command),
            None => debug!(widget = %widget.name, "slider has no command"),
        }
        Ok(Response::ok())
    }

    fn volume(&mut self, request: &Request) -> Handled {
        let widget = lookup(&self.tree, request, VOLUME_KINDS)?;
        let kind = NodeKind::from_widget(widget.kind)
            .ok_or_else(|| Response::bad_request("not a volume widget"))?;
        // Stream indexes are the only target taken from the client; node names
        // always come from the config.
        let target = if widget.kind == WidgetKind::SinkInputs {
            let stream = request
                .query_value("stream")
                .ok_or_else(|| Response::bad_request("missing stream"))?;
            let index: u32 = stream
                .parse()
                .map_err(|_| Response::bad_request("stream must be a number"))?;
            index.to_string()
        } else {
            volume_target(widget).to_string()
        };
        let command = match request.query_value("action") {
            Some("mute") => volume_mute_command(self.backend.as_ref(), widget, kind, &target),
            Some("set") => {
                let value = snap_volume(number_param(request, "value")?);
                volume_set_command(self.backend.as_ref(), widget, kind, &target, value)
            }
            _ => return Err(Response::bad_request("action must be mute or set")),
        };
        self.runner.spawn(&command);
        self.audio.invalidate();
        Ok(Response::ok())
    }

    fn read_config(&self) -> Handled {
        match fs::read_to_string(&self.config_path) {
            Ok(text) => Ok(Response::text(200, text)),
            Err(err) => {
                debug!(path = %self.config_path.display(), ?err, "config not readable");
                Err(Response::not_found())
            }
        }
    }

    fn save_config(&mut self, request: &Request) -> Handled {
        let text = request.body_text();
        if let Err(err) = Ini::parse(&text) {
            return Err(Response::bad_request(err.to_string()));
        }
        if let Err(err) = save_config_text(&self.config_path, &text) {
            warn!(path = %self.config_path.display(), %err, "config not saved");
            return Err(Response::bad_request(err.to_string()));
        }
        info!(path = %self.config_path.display(), "config saved");
        self.reload();
        Ok(Response::ok())
    }

    fn close(&self, request: &Request) -> Handled {
        let command = match request.query_value("pid") {
            Some(pid) => {
                let pid: u32 = pid
                    .parse()
                    .map_err(|_| Response::bad_request("pid must be a number"))?;
                CommandLine::args(["kill".to_string(), pid.to_string()])
            }
            None => CommandLine::args(["pkill", "-x", GUI_PROCESS_NAME]),
        };
        info!(%command, "closing desktop window");
        self.runner.spawn(&command);
        Ok(Response::ok())
    }

    fn image(&self, request: &Request) -> Handled {
        let widget = lookup(&self.tree, request, IMAGE_KINDS)?;
        let configured = if alt_flag(request) {
            widget
                .prop_opt("image-alt")
                .or_else(|| widget.prop_opt("image"))
        } else {
            widget.prop_opt("image")
        };
        let path = configured
            .map(|path| expand_home(Path::new(path.trim())))
            .ok_or_else(Response::not_found)?;
        let bytes = fs::read(&path).map_err(|err| {
            debug!(path = %path.display(), ?err, "image not readable");
            Response::not_found()
        })?;
        Ok(Response::bytes(200, image_content_type(&path), bytes))
    }
}

fn lookup<'a>(
    tree: &'a WidgetTree,
    request: &Request,
    kinds: &[WidgetKind],
) -> Result<&'a WidgetDescriptor, Response> {
    let raw = request
        .query_value("id")
        .ok_or_else(|| Response::bad_request("missing id"))?;
    let id: WidgetId = raw.parse().map_err(Response::bad_request)?;
    let widget = tree.widget(id).ok_or_else(Response::not_found)?;
    if !kinds.contains(&widget.kind) {
        return Err(Response::bad_request(format!(
            "widget {id} is a {}",
            widget.kind
        )));
    }
    Ok(widget)
}

fn alt_flag(request: &Request) -> bool {
    request
        .query_value("alt")
        .and_then(parse_flag)
        .unwrap_or(false)
}

fn number_param(request: &Request, key: &str) -> Result<f64, Response> {
    request
        .query_value(key)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .ok_or_else(|| Response::bad_request(format!("{key} must be a number")))
}

fn image_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
