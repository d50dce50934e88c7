//! Opens the deck page in a browser window and keeps it tied to the launcher.

use std::env;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use controldeck_core::command::kill_process_group;
use controldeck_core::{CommandLine, GuiSettings, APP_NAME};
use tokio::process::Child;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::server_process::Endpoint;
use crate::shutdown_signal::shutdown_signal;

/// Browsers that support `--app` windows, in order of preference.
const APP_BROWSERS: [&str; 4] = ["chromium", "chromium-browser", "google-chrome", "brave-browser"];
const TERMINATE_GRACE: Duration = Duration::from_millis(600);

/// Page URL that marks the request as coming from this launcher.
pub fn deck_url(endpoint: &Endpoint, pid: u32) -> Result<Url> {
    let mut url = Url::parse(&format!("http://{}/", endpoint.authority()))
        .with_context(|| format!("invalid server address {}", endpoint.authority()))?;
    url.query_pairs_mut()
        .append_key_only("gui")
        .append_pair("pid", &pid.to_string());
    Ok(url)
}

fn profile_dir() -> PathBuf {
    let cache = env::var_os("XDG_CACHE_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
        .unwrap_or_else(env::temp_dir);
    cache.join(APP_NAME).join("browser")
}

/// Command that shows the deck: the `[gui] browser` template, else an app-mode
/// browser found on PATH, else `xdg-open`.
pub fn window_command(
    gui: &GuiSettings,
    url: &Url,
    installed: impl Fn(&str) -> bool,
) -> CommandLine {
    if let Some(template) = gui.browser.as_deref() {
        return CommandLine::shell(fill_template(template, gui, url.as_str()));
    }
    match APP_BROWSERS.iter().find(|browser| installed(browser)) {
        Some(browser) => CommandLine::Args(app_window_args(browser, gui, url.as_str())),
        None => CommandLine::args(["xdg-open", url.as_str()]),
    }
}

fn app_window_args(browser: &str, gui: &GuiSettings, url: &str) -> Vec<String> {
    // A dedicated profile keeps the window in its own process we can wait on.
    let mut args = vec![
        browser.to_string(),
        format!("--app={url}"),
        format!("--class={APP_NAME}"),
        format!("--user-data-dir={}", profile_dir().display()),
        format!(
            "--window-size={},{}",
            gui.width.max(gui.min_width),
            gui.height.max(gui.min_height)
        ),
    ];
    if let (Some(x), Some(y)) = (gui.x, gui.y) {
        args.push(format!("--window-position={x},{y}"));
    }
    if gui.fullscreen {
        args.push("--start-fullscreen".to_string());
    }
    if gui.maximized {
        args.push("--start-maximized".to_string());
    }
    args
}

fn fill_template(template: &str, gui: &GuiSettings, url: &str) -> String {
    let x = gui.x.map(|x| x.to_string()).unwrap_or_default();
    let y = gui.y.map(|y| y.to_string()).unwrap_or_default();
    template
        .replace("{url}", &shell_quote(url))
        .replace("{width}", &gui.width.to_string())
        .replace("{height}", &gui.height.to_string())
        .replace("{x}", &x)
        .replace("{y}", &y)
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Log window options a browser launch cannot honour.
pub fn log_unsupported_options(gui: &GuiSettings) {
    let defaults = GuiSettings::default();
    let ignored: Vec<&str> = [
        ("frameless", gui.frameless != defaults.frameless),
        ("minimized", gui.minimized != defaults.minimized),
        ("always-on-top", gui.always_on_top != defaults.always_on_top),
        ("confirm-close", gui.confirm_close != defaults.confirm_close),
        ("transparent", gui.transparent != defaults.transparent),
        ("menu", gui.menu != defaults.menu),
        ("resizable", gui.resizable != defaults.resizable),
    ]
    .into_iter()
    .filter_map(|(name, changed)| changed.then_some(name))
    .collect();
    if !ignored.is_empty() {
        debug!(options = ?ignored, "window options not supported by the browser launcher");
    }
}

/// Run the window until it exits or the launcher is asked to stop.
pub async fn run(command: &CommandLine) -> Result<()> {
    let mut process = command.to_command();
    process.stdout(Stdio::null()).stderr(Stdio::null());
    let mut child = tokio::process::Command::from(process)
        .spawn()
        .with_context(|| format!("start window command `{command}`"))?;
    let pid = child.id();
    info!(?pid, %command, "deck window opened");

    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => info!(code = ?status.code(), "deck window closed"),
            Err(err) => warn!(?err, "failed to wait for deck window"),
        },
        _ = shutdown_signal() => {
            info!("shutdown requested, closing deck window");
            terminate_window(&mut child, pid).await;
        }
    }
    Ok(())
}

async fn terminate_window(child: &mut Child, pid: Option<u32>) {
    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        let _ = child.kill().await;
        return;
    };
    // The window runs in its own session; signal the whole group.
    #[cfg(unix)]
    unsafe {
        libc::kill(-pid, libc::SIGTERM);
    }
    let start = Instant::now();
    while start.elapsed() < TERMINATE_GRACE {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    warn!(pid, "force killing unresponsive deck window");
    kill_process_group(pid);
    let _ = child.kill().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "127.0.0.1".into(),
            port: 8000,
        }
    }

    #[test]
    fn url_marks_gui_and_pid() {
        let url = deck_url(&endpoint(), 4242).expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/?gui&pid=4242");
    }

    #[test]
    fn app_browser_gets_geometry() {
        let gui = GuiSettings {
            width: 1024,
            height: 50,
            x: Some(10),
            y: Some(20),
            fullscreen: true,
            ..GuiSettings::default()
        };
        let url = deck_url(&endpoint(), 1).expect("url");
        let command = window_command(&gui, &url, |program| program == "google-chrome");
        let CommandLine::Args(args) = command else {
            panic!("expected argument vector");
        };
        assert_eq!(args[0], "google-chrome");
        assert_eq!(args[1], "--app=http://127.0.0.1:8000/?gui&pid=1");
        assert!(args.contains(&"--window-size=1024,100".to_string()));
        assert!(args.contains(&"--window-position=10,20".to_string()));
        assert!(args.contains(&"--start-fullscreen".to_string()));
        assert!(!args.contains(&"--start-maximized".to_string()));
    }

    #[test]
    fn position_needs_both_coordinates() {
        let gui = GuiSettings {
            x: Some(10),
            ..GuiSettings::default()
        };
        let args = app_window_args("chromium", &gui, "http://x/");
        assert!(!args.iter().any(|arg| arg.starts_with("--window-position")));
    }

    #[test]
    fn falls_back_to_xdg_open() {
        let url = deck_url(&endpoint(), 1).expect("url");
        let command = window_command(&GuiSettings::default(), &url, |_| false);
        assert_eq!(
            command,
            CommandLine::args(["xdg-open", "http://127.0.0.1:8000/?gui&pid=1"])
        );
    }

    #[test]
    fn browser_template_is_filled_and_quoted() {
        let gui = GuiSettings {
            browser: Some("surf -g {width}x{height}+{x}+{y} {url}".into()),
            x: Some(5),
            y: Some(6),
            ..GuiSettings::default()
        };
        let url = deck_url(&endpoint(), 9).expect("url");
        assert_eq!(
            window_command(&gui, &url, |_| true),
            CommandLine::shell("surf -g 800x600+5+6 'http://127.0.0.1:8000/?gui&pid=9'")
        );
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn run_returns_when_the_window_exits() {
        run(&CommandLine::args(["true"])).await.expect("run");
        assert!(run(&CommandLine::args(["/nonexistent/controldeck-window"]))
            .await
            .is_err());
    }
}
