//! snare: browser media capture and download takeover agent
//!
//! Runs as the browser's native-messaging host. Sets up the allocator and
//! logging, loads configuration, then bridges stdin/stdout to the agent
//! until the browser closes the channel.

mod bridge;
mod native;

use anyhow::Result;
use bridge::NativeHost;
use clap::Parser;
use snare_agent::{Agent, AgentConfig, FilePreference};
use snare_peer::{Heartbeat, HttpPeer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "snare", version, about = "Browser media capture and download takeover agent")]
struct Cli {
    /// Configuration file (default: <config dir>/snare/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preference file (default: <data dir>/snare/preferences.json)
    #[arg(long)]
    preference: Option<PathBuf>,

    /// Log filter, overrides the configured level
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Caller origin or manifest arguments passed by the browser
    #[arg(hide = true)]
    caller: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AgentConfig::load(cli.config.as_deref())?;

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    init_logging(cli.log_level.as_deref().unwrap_or(&config.log.level));
    info!("snare {} starting", env!("CARGO_PKG_VERSION"));
    if !cli.caller.is_empty() {
        debug!("Launched by {:?}", cli.caller);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, cli.preference))?;

    info!("snare shutting down");
    Ok(())
}

/// stdout carries frames, so logs go to stderr.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

async fn run(config: AgentConfig, preference: Option<PathBuf>) -> Result<()> {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let host = Arc::new(NativeHost::new(outbound_tx, config.host_timeout()));
    let writer = tokio::spawn(native::write_loop(tokio::io::stdout(), outbound_rx));

    let preference = preference.map(FilePreference::new).unwrap_or_default();
    info!("Preference file: {:?}", preference.path());

    let agent = Arc::new(Agent::new(
        host.clone(),
        Arc::new(HttpPeer::new(config.peer_config())),
        Box::new(preference),
        config.capture.pending_capacity,
    ));

    let _heartbeat = Heartbeat::spawn(&config.heartbeat_plan(), agent.clone());
    tokio::spawn({
        let agent = agent.clone();
        async move { agent.start().await }
    });

    bridge::serve(tokio::io::stdin(), host, agent).await?;

    if writer.is_finished() {
        match writer.await {
            Ok(Err(e)) => warn!("Writer stopped: {}", e),
            Err(e) => warn!("Writer task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }
    Ok(())
}
