//! # tally-core
//!
//! Shared library for the multiviewer layout trigger bridge containing the
//! TSL 5.0 tally packet codec and the domain entities that decide *what* gets
//! sent to a multiviewer card.
//!
//! This crate is used by the `tally-bridge` service and by its tests.
//! It has zero dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! A broadcast multiviewer card composes up to nine video inputs into one
//! output picture.  Which arrangement ("layout") is shown is selected by a
//! numbered preset.  The cards do not expose a request/response API for
//! this; instead they listen for TSL 5.0 *tally* packets and treat a short
//! ON-then-OFF pulse on tally index *N* as "recall preset *N*".
//!
//! This crate (`tally-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How a tally pulse looks on the wire: a fixed 12-byte
//!   little-endian packet carrying the preset index and the ON/OFF control
//!   byte.
//!
//! - **`domain`** – Pure business logic with no I/O:
//!   - the fixed 22-slot [`CardRegistry`] of card endpoints,
//!   - the static [`LayoutCatalog`] mapping layout names to tally indices,
//!   - the two-sided [`MultiviewerCard`] model sharing one 9-input bank,
//!   - the [`StagingLedger`] of pending layout changes,
//!   - the [`TriggerRequest`] / [`TriggerResult`] / [`BatchResult`] types
//!     that flow back to the operator.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `tally_core::CardRegistry` instead of `tally_core::domain::card::CardRegistry`.
pub use domain::card::{CardEndpoint, CardId, CardRegistry, EndpointUpdate, RegistryError};
pub use domain::layout::{LayoutCatalog, LayoutCell, LayoutDefinition};
pub use domain::multiviewer::{
    DisplayId, LayoutChange, LayoutError, MultiviewerBank, MultiviewerCard, MultiviewerSide, Side,
};
pub use domain::staging::{StagedChange, StagingLedger};
pub use domain::trigger::{BatchResult, TriggerMode, TriggerRequest, TriggerResult};
pub use protocol::tsl5::{decode_tally, encode_tally, PacketError, TallyPacket};
