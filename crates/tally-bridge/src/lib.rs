//! tally-bridge library crate.
//!
//! This crate provides the HTTP service that turns operator layout edits into
//! TSL 5.0 tally pulses on broadcast multiviewer cards.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Operator UI (JSON over HTTP)
//!         ↕
//! [tally-bridge]
//!   ├── domain/            Pure types: BridgeConfig, HTTP request/response bodies
//!   ├── application/       TriggerService (pulse sequences, batches)
//!   │                      StagingStore (staged vs immediate edits)
//!   └── infrastructure/
//!         ├── transport/   UDP / TCP packet delivery and connectivity probe
//!         ├── http_server/ axum router and handlers
//!         └── storage/     TOML settings + card roster
//!         ↕
//! Multiviewer cards (TSL 5.0 tally packets, port 8902)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `tally-core` and the
//!   [`PacketTransport`](infrastructure::transport::PacketTransport) trait.
//! - `infrastructure` depends on all other layers plus `tokio` and `axum`.
//!
//! # For beginners: why is there no response from the card?
//!
//! The cards only *listen* for tally packets.  A trigger is a short pulse:
//! tally ON for the preset index, a 100 ms pause, tally OFF, and a 50 ms
//! pause so the OFF packet leaves the socket before the next pulse.  Nothing
//! is acknowledged, so a "successful" trigger means "both packets were
//! handed to the network", never "the card changed layout".

/// Domain layer: configuration and API message types (no I/O).
pub mod domain;

/// Application layer: trigger sequencing and the staging store.
pub mod application;

/// Infrastructure layer: packet transport, HTTP server, config storage.
pub mod infrastructure;
