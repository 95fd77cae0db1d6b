//! GPIO box agent entry point.
//!
//! ```text
//! gpiobox-agent                  Run in the foreground
//! gpiobox-agent --config <path>  Load a custom config TOML
//! gpiobox-agent --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gpiobox_agent::api::{self, ApiState, PageTemplate};
use gpiobox_agent::config::AgentConfig;
use gpiobox_agent::restart::{self, RestartHandle};
use gpiobox_agent::supervisor::Supervisor;
use gpiobox_agent::{pin, probe};
use gpiobox_core::{BoxError, HeartbeatScheduler, MonotonicClock, StreamClient, WsConnector};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "gpiobox-agent", about = "GPIO box controller agent")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "gpiobox.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", AgentConfig::default_toml()?);
        return Ok(());
    }

    let (config, fallback) = AgentConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match fallback {
        None => info!("config loaded from {}", cli.config.display()),
        Some(BoxError::Transport(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("no config at {}; using defaults", cli.config.display())
        }
        Some(e) => warn!("could not load config: {e}; using defaults"),
    }

    let client_config = config.to_client_config();
    info!("gpiobox-agent v{}", env!("CARGO_PKG_VERSION"));
    info!("coordinator: {}", client_config.endpoint.url());
    info!("output pin: {} ({:?})", config.output.pin, config.output.backend);
    info!("heartbeat: every {} ms", config.heartbeat.interval_ms);

    let output = pin::open_output(&config.output)?;
    let clock = Arc::new(MonotonicClock::new());
    let restart = RestartHandle::new();

    // HTTP control surface.
    let state = ApiState::new(
        output.clone(),
        PageTemplate::load(config.page_path().as_deref()),
        probe::from_config(&config.probe, config.coordinator.port),
        config.coordinator.host.clone(),
        restart.clone(),
    );
    let addr = config.http_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP control surface listening on {addr}");

    let shutdown = restart.clone();
    let http = tokio::spawn(async move {
        axum::serve(listener, api::router(state))
            .with_graceful_shutdown(async move { shutdown.requested().await })
            .await
    });

    // Coordinator link and heartbeat.
    let client = StreamClient::new(client_config, Arc::new(WsConnector), output.clone(), clock.clone());
    let heartbeat =
        HeartbeatScheduler::new(config.heartbeat.interval_ms).with_event(config.heartbeat.event.clone());
    let mut supervisor = Supervisor::new(client, heartbeat, output, clock, config.quantum());
    let stop = supervisor.stop_handle();

    let stop_clone = stop.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop_clone.store(false, Ordering::SeqCst);
    });

    let watcher = restart.clone();
    tokio::spawn(async move {
        watcher.requested().await;
        stop.store(false, Ordering::SeqCst);
    });

    supervisor.run().await;

    if !restart.is_requested() {
        http.abort();
        return Ok(());
    }

    // Let the reboot reply reach the client before the process goes.
    let grace = Duration::from_millis(config.restart.grace_ms);
    match tokio::time::timeout(grace, http).await {
        Ok(Ok(Ok(()))) => info!("HTTP server drained"),
        Ok(Ok(Err(e))) => warn!("HTTP server error during shutdown: {e}"),
        Ok(Err(e)) => warn!("HTTP task failed: {e}"),
        Err(_) => warn!("HTTP server did not drain within {grace:?}"),
    }

    if let Err(e) = restart::restart_process(config.restart.mode) {
        error!("restart failed: {e}");
        return Err(e.into());
    }
    Ok(())
}
