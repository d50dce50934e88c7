//! ControlDeck window launcher.

use std::path::PathBuf;
use std::process::{self, ExitCode};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use controldeck_core::util::log_directive;
use controldeck_core::{
    configured_log_level, load_config, program_in_path, CommandExecutor, DeckSettings, GuiSettings,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod server_process;
mod shutdown_signal;
mod window;

use server_process::Endpoint;

const START_WAIT: Duration = Duration::from_secs(5);
const EXIT_NO_SERVER: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Open the ControlDeck page in its own window")]
struct Args {
    /// Path to controldeck.conf
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Server host, overrides `[default] host`
    #[arg(long)]
    host: Option<String>,
    /// Server port, overrides `[default] port`
    #[arg(long)]
    port: Option<u16>,
    /// Start the server when it is not running
    #[arg(short, long)]
    start: bool,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
    /// Log at trace level and dump the effective settings
    #[arg(short = 'D', long, hide = true)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&args);
    let loaded = load_config(args.config.as_deref());
    info!(
        config_source = loaded.source.as_str(),
        path = %loaded.path.display(),
        "configuration loaded"
    );

    let mut settings = DeckSettings::from_ini(&loaded.ini);
    if let Some(host) = args.host.clone() {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    let gui = GuiSettings::from_ini(&loaded.ini);
    if args.debug {
        debug!(?args, ?settings, ?gui, "effective settings");
    }

    let endpoint = Endpoint::from_settings(&settings);
    let runner = CommandExecutor::new(settings.probe_timeout());
    if !server_process::is_running(&endpoint, &runner, START_WAIT).await {
        if !args.start {
            error!(endpoint = %endpoint.authority(), "controldeck server is not running");
            server_process::notify_missing().await;
            return Ok(ExitCode::from(EXIT_NO_SERVER));
        }
        let command = server_process::server_command(
            args.config.as_deref(),
            args.host.as_deref(),
            args.port,
        );
        server_process::start(&runner, &command);
        if !server_process::wait_until_reachable(&endpoint, START_WAIT).await {
            error!(%command, "controldeck server failed to start");
            return Ok(ExitCode::from(EXIT_NO_SERVER));
        }
    }

    let url = window::deck_url(&endpoint, process::id())?;
    window::log_unsupported_options(&gui);
    let command = window::window_command(&gui, &url, program_in_path);
    window::run(&command).await?;
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(args: &Args) {
    let configured = configured_log_level(args.config.as_deref());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(log_directive(args.debug, args.verbose, configured.as_deref()))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
