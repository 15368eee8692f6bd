//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is assembled in `main.rs` from the TOML file and the command line, and
//! falls back to [`Default`] for anything neither of them sets.
//!
//! The infrastructure layer is responsible for populating the struct; the
//! domain never reads files or environment variables itself.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_core::domain::card::DEFAULT_CARD_PORT;
use tally_core::TriggerMode;

/// Port the HTTP API listens on unless configured otherwise.
pub const DEFAULT_HTTP_PORT: u16 = 3001;

/// How tally packets travel to the cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One datagram per packet from a single bound socket.
    #[default]
    Udp,
    /// A short-lived TCP connection per packet.
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Udp => f.write_str("udp"),
            TransportKind::Tcp => f.write_str("tcp"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(TransportKind::Udp),
            "tcp" => Ok(TransportKind::Tcp),
            other => Err(format!("unknown transport '{other}' (expected udp or tcp)")),
        }
    }
}

/// All runtime configuration for the bridge.
///
/// Build this once at startup and share it behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use tally_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 3001);
/// assert_eq!(cfg.pulse_width.as_millis(), 100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Address the HTTP API binds to.  Loopback by default: the control
    /// channel is unauthenticated.
    pub bind_addr: SocketAddr,

    /// Card port used when a request or roster entry omits one.
    pub default_card_port: u16,

    /// Packet transport towards the cards.
    pub transport: TransportKind,

    /// Time between the ON and OFF packet of one pulse.
    pub pulse_width: Duration,

    /// Pause after the OFF packet before the sequence reports success.
    pub flush_interval: Duration,

    /// Upper bound for one `/test` connectivity probe.
    pub probe_timeout: Duration,

    /// Upper bound for handing a single packet to the transport.
    pub send_timeout: Duration,

    /// Maximum number of destinations pulsed at the same time in a batch.
    pub batch_concurrency: usize,

    /// Whether layout edits are staged or fired immediately at startup.
    pub trigger_mode: TriggerMode,
}

impl Default for BridgeConfig {
    /// | Field              | Default          |
    /// |--------------------|------------------|
    /// | bind_addr          | `127.0.0.1:3001` |
    /// | default_card_port  | `8902`           |
    /// | transport          | `udp`            |
    /// | pulse_width        | 100 ms           |
    /// | flush_interval     | 50 ms            |
    /// | probe_timeout      | 3 s              |
    /// | send_timeout       | 5 s              |
    /// | batch_concurrency  | 8                |
    /// | trigger_mode       | `staged`         |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_HTTP_PORT)),
            default_card_port: DEFAULT_CARD_PORT,
            transport: TransportKind::Udp,
            pulse_width: Duration::from_millis(100),
            flush_interval: Duration::from_millis(50),
            probe_timeout: Duration::from_secs(3),
            send_timeout: Duration::from_secs(5),
            batch_concurrency: 8,
            trigger_mode: TriggerMode::Staged,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
