//! Domain entities for the multiviewer layout trigger bridge.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain** (or "entities" layer).  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from OS APIs, network libraries, or async runtimes.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Here the rules are: which card lives at which address, which layout name
//! maps to which preset index, how the two sides of a card share nine
//! inputs, and which layout changes are waiting to be sent.

/// Fixed roster of addressable multiviewer cards.
pub mod card;

/// Static catalog of layout templates and their tally indices.
pub mod layout;

/// Two-sided multiviewer cards sharing one 9-input bank.
pub mod multiviewer;

/// Pending layout-change ledger keyed by display.
pub mod staging;

/// Trigger requests and their per-target / batch results.
pub mod trigger;
