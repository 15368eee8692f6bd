//! Application layer for tally-bridge.
//!
//! The application layer knows *what* to do with an operator request and
//! delegates *how* packets travel to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Resolving a card and layout into a tally index
//! - Running pulse sequences and batches with bounded concurrency
//! - Holding the staged-changes ledger and the current trigger mode
//!
//! # What does NOT belong here?
//!
//! - Opening sockets (that is infrastructure)
//! - HTTP routing and status codes (that is infrastructure)

pub mod staging_service;
pub mod trigger_service;

pub use staging_service::{CommitOutcome, LayoutChangeOutcome, StagingStore};
pub use trigger_service::{Clock, SystemClock, TriggerError, TriggerService};
