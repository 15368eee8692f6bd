//! Infrastructure layer for tally-bridge.
//!
//! All I/O lives here: sockets towards the cards, the HTTP listener for the
//! operator UI, and the TOML file holding settings and the card roster.
//!
//! # What does NOT belong here?
//!
//! - Deciding which index to pulse (application layer)
//! - Request validation that needs no I/O (domain layer)

pub mod http_server;
pub mod storage;
pub mod transport;

pub use http_server::{build_router, run_server, AppState};
