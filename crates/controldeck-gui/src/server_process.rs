//! Finding, starting and waiting for the deck server.

use std::env;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use controldeck_core::{program_in_path, CommandExecutor, CommandLine, CommandRunner, DeckSettings};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

const SERVER_BINARY: &str = "controldeck";
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const MISSING_SERVER_MESSAGE: &str =
    "controldeck is not running. Start it first or run controldeck-gui --start.";

/// Where the launcher expects the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host as it appears in URLs; wildcard binds map to loopback.
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn from_settings(settings: &DeckSettings) -> Self {
        let host = match settings.host.trim() {
            "" | "0.0.0.0" => "127.0.0.1".to_string(),
            "::" | "[::]" => "[::1]".to_string(),
            host if host.contains(':') && !host.starts_with('[') => format!("[{host}]"),
            host => host.to_string(),
        };
        Self {
            host,
            port: settings.port,
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn connect_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    pub async fn is_reachable(&self) -> bool {
        let connect = TcpStream::connect((self.connect_host(), self.port));
        matches!(timeout(CONNECT_TIMEOUT, connect).await, Ok(Ok(_)))
    }
}

/// The endpoint accepts connections. A listed server process that is not yet
/// reachable gets up to `limit` to open its port.
pub async fn is_running<R>(endpoint: &Endpoint, runner: &R, limit: Duration) -> bool
where
    R: CommandRunner + Clone + 'static,
{
    if endpoint.is_reachable().await {
        return true;
    }
    let runner = runner.clone();
    let listed = tokio::task::spawn_blocking(move || {
        runner.probe(&CommandLine::args(["ps", "--no-headers", "-C", SERVER_BINARY]))
    })
    .await
    .unwrap_or_default();
    debug!(process = %listed, "server process lookup");
    if listed.is_empty() {
        return false;
    }
    info!(endpoint = %endpoint.authority(), "server process found, waiting for its port");
    wait_until_reachable(endpoint, limit).await
}

/// Command that starts the server with the launcher's config and overrides.
pub fn server_command(
    config: Option<&Path>,
    host: Option<&str>,
    port: Option<u16>,
) -> CommandLine {
    let program = resolve_server_path()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|| SERVER_BINARY.to_string());
    let mut args = vec![program];
    if let Some(config) = config {
        args.push("--config".to_string());
        args.push(config.to_string_lossy().into_owned());
    }
    if let Some(host) = host {
        args.push("--host".to_string());
        args.push(host.to_string());
    }
    if let Some(port) = port {
        args.push("--port".to_string());
        args.push(port.to_string());
    }
    CommandLine::Args(args)
}

fn resolve_server_path() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let dir = exe.parent()?;
    let candidate = dir.join(SERVER_BINARY);
    if candidate.is_file() {
        return Some(candidate);
    }
    None
}

/// Start the server detached so it outlives the window.
pub fn start(runner: &dyn CommandRunner, command: &CommandLine) {
    info!(%command, "starting controldeck server");
    runner.spawn(command);
}

/// Poll until the endpoint accepts connections or `limit` passes.
pub async fn wait_until_reachable(endpoint: &Endpoint, limit: Duration) -> bool {
    let started = Instant::now();
    while started.elapsed() < limit {
        if endpoint.is_reachable().await {
            return true;
        }
        sleep(POLL_INTERVAL).await;
    }
    warn!(endpoint = %endpoint.authority(), "server did not come up in time");
    false
}

/// Tell the user no server is running: a dialog when zenity exists, stderr otherwise.
pub async fn notify_missing() {
    if !program_in_path("zenity") {
        eprintln!("{MISSING_SERVER_MESSAGE}");
        return;
    }
    let dialog = CommandLine::args([
        "zenity".to_string(),
        "--error".to_string(),
        "--no-wrap".to_string(),
        "--title=controldeck".to_string(),
        format!("--text={MISSING_SERVER_MESSAGE}"),
    ]);
    // The dialog blocks until dismissed.
    let shown = tokio::task::spawn_blocking(move || {
        CommandExecutor::new(None).probe(&dialog);
    })
    .await;
    if let Err(err) = shown {
        warn!(?err, "zenity dialog failed");
        eprintln!("{MISSING_SERVER_MESSAGE}");
    }
}
