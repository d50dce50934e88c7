//! ControlDeck server entrypoint.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use controldeck_core::util::{self, log_directive};
use controldeck_core::{configured_log_level, load_config, CommandExecutor, CommandRunner, DeckSettings};
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod audio;
mod controls;
mod deck;
mod http;
mod render;
mod server;
mod shutdown_signal;
#[cfg(test)]
mod testing;

use audio::AudioStateCache;
use deck::Deck;

#[derive(Parser, Debug)]
#[command(author, version, about = "Web control deck for shell commands and audio volume")]
struct Args {
    /// Path to controldeck.conf
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Address to bind, overrides `[default] host`
    #[arg(long)]
    host: Option<String>,
    /// Port to bind, overrides `[default] port`
    #[arg(long)]
    port: Option<u16>,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
    /// Log at trace level and dump the effective settings
    #[arg(short = 'D', long, hide = true)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);
    let loaded = load_config(args.config.as_deref());
    info!(
        config_source = loaded.source.as_str(),
        path = %loaded.path.display(),
        "configuration loaded"
    );
    if util::diagnostic_mode() {
        info!(
            limit = util::log_limit(),
            "diagnostic logging enabled (snippets capped; newlines stripped)"
        );
    }

    let mut settings = DeckSettings::from_ini(&loaded.ini);
    if let Some(host) = args.host.clone() {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if args.debug {
        debug!(?args, ?settings, "effective settings");
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(CommandExecutor::new(settings.probe_timeout()));
    let preference = settings.audio_backend;
    let probe_runner = runner.clone();
    let backend =
        tokio::task::spawn_blocking(move || audio::select_backend(preference, probe_runner.as_ref()))
            .await
            .context("select audio backend")?;
    let deck = Deck::new(
        args.config.clone(),
        loaded,
        runner,
        backend,
        AudioStateCache::default(),
    );
    info!(widgets = deck.tree().len(), tabs = deck.tree().tab_count(), "widget tree ready");

    let address = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("bind {address}"))?;
    let local = listener.local_addr().context("read bound address")?;
    info!(
        url = %format!("http://{local}/"),
        config = %deck.config_path().display(),
        "controldeck listening"
    );
    server::serve(
        listener,
        Arc::new(Mutex::new(deck)),
        shutdown_signal::shutdown_signal(),
    )
    .await
}

fn init_tracing(args: &Args) {
    let configured = configured_log_level(args.config.as_deref());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(log_directive(args.debug, args.verbose, configured.as_deref()))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
