//! Multiviewer tally bridge: entry point.
//!
//! This binary exposes a small JSON-over-HTTP API to the operator UI and
//! turns layout edits into TSL 5.0 tally pulses on the multiviewer cards.
//!
//! # Usage
//!
//! ```text
//! tally-bridge [OPTIONS]
//!
//! Options:
//!   --config     <PATH>  TOML file with [bridge] settings and [[cards]]
//!   --bind       <IP>    HTTP bind address            [file / 127.0.0.1]
//!   --port       <PORT>  HTTP port                    [file / 3001]
//!   --transport  <KIND>  udp | tcp                    [file / udp]
//!   --mode       <MODE>  staged | immediate at start  [file / staged]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable          | Description                    |
//! |-------------------|--------------------------------|
//! | `TALLY_CONFIG`    | Config file path               |
//! | `TALLY_BIND`      | HTTP bind address              |
//! | `TALLY_PORT`      | HTTP port                      |
//! | `TALLY_TRANSPORT` | Packet transport (`udp`/`tcp`) |
//! | `TALLY_MODE`      | Initial trigger mode           |
//!
//! Precedence: command line, then environment, then the config file, then
//! the built-in defaults.  `RUST_LOG` overrides the file's `log_level`.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tally_bridge::application::SystemClock;
use tally_bridge::domain::{BridgeConfig, TransportKind};
use tally_bridge::infrastructure::storage::{load_config, BridgeSection, ConfigStore};
use tally_bridge::infrastructure::transport::build_transport;
use tally_bridge::infrastructure::{run_server, AppState};
use tally_core::TriggerMode;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// HTTP bridge that pulses TSL 5.0 layout presets on multiviewer cards.
#[derive(Debug, Parser)]
#[command(
    name = "tally-bridge",
    about = "HTTP bridge that pulses TSL 5.0 layout presets on multiviewer cards",
    version
)]
struct Cli {
    /// Path of the TOML config file.  A missing file means "all defaults".
    #[arg(long, default_value = "tally-bridge.toml", env = "TALLY_CONFIG")]
    config: PathBuf,

    /// IP address the HTTP API binds to.
    #[arg(long, env = "TALLY_BIND")]
    bind: Option<String>,

    /// TCP port of the HTTP API.
    #[arg(long, env = "TALLY_PORT")]
    port: Option<u16>,

    /// Packet transport towards the cards: `udp` or `tcp`.
    #[arg(long, env = "TALLY_TRANSPORT")]
    transport: Option<String>,

    /// Trigger mode at startup: `staged` or `immediate`.
    #[arg(long, env = "TALLY_MODE")]
    mode: Option<String>,
}

impl Cli {
    /// Layers the CLI overrides on top of the file section and converts the
    /// result into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address, transport or mode is invalid.
    fn into_bridge_config(self, file: &BridgeSection) -> anyhow::Result<BridgeConfig> {
        let mut section = file.clone();
        if let Some(bind) = self.bind {
            section.bind_address = bind;
        }
        if let Some(port) = self.port {
            section.http_port = port;
        }
        if let Some(transport) = self.transport {
            section.transport = transport
                .parse::<TransportKind>()
                .map_err(anyhow::Error::msg)
                .context("invalid --transport")?;
        }
        if let Some(mode) = self.mode {
            section.trigger_mode = mode
                .parse::<TriggerMode>()
                .map_err(anyhow::Error::msg)
                .context("invalid --mode")?;
        }
        section
            .to_bridge_config()
            .context("invalid bridge configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file = load_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the file's `log_level` applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&file.bridge.log_level)),
        )
        .init();

    let config_path = cli.config.clone();
    let config = cli.into_bridge_config(&file.bridge)?;
    let registry = file
        .registry()
        .with_context(|| format!("invalid card roster in {}", config_path.display()))?;

    info!(
        bind = %config.bind_addr,
        transport = %config.transport,
        mode = %config.trigger_mode,
        enabled_cards = registry.enabled().count(),
        "tally bridge starting"
    );

    let transport = build_transport(config.transport, config.send_timeout)
        .await
        .context("failed to open packet transport")?;

    let state = AppState::new(
        config,
        transport,
        Arc::new(SystemClock),
        registry,
        Some(Arc::new(ConfigStore::new(config_path, file))),
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(state, running).await?;

    info!("tally bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
