//! Domain layer for tally-bridge.
//!
//! Pure types with no dependencies on I/O, sockets or the async runtime.
//!
//! # What belongs in the domain layer?
//!
//! - The runtime configuration ([`BridgeConfig`]) and transport choice
//! - The JSON request and response bodies of the HTTP API
//! - Validation that only looks at the request itself (index ≥ 1, ip present)
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `UdpSocket` or `axum` types
//! - File I/O or environment variable reading

pub mod config;
pub mod messages;

pub use config::{BridgeConfig, TransportKind};
