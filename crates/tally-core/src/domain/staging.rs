//! Staging ledger: layout changes waiting for an operator "apply".
//!
//! In staged mode an operator may rearrange several displays before any card
//! is touched.  Each edit lands here, keyed by [`DisplayId`], and the whole
//! ledger is later committed as one batch.
//!
//! Per display the ledger behaves like a tiny state machine:
//!
//! ```text
//!            stage(from != to)            stage(from != to)
//!  Unstaged ───────────────────► Staged ◄──────────────────┐
//!     ▲                            │  └────────────────────┘
//!     └──── stage(from == to) ─────┤
//!     └──── unstage / clear ───────┘
//! ```
//!
//! Staging is last-writer-wins; no history is kept.  The ledger itself has
//! no lock; the bridge wraps it in a mutex.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::card::CardId;
use crate::domain::multiviewer::DisplayId;

/// One pending layout change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedChange {
    pub display_id: DisplayId,
    /// Layout the display showed when the change was first staged.
    pub from_layout: String,
    pub to_layout: String,
    pub card_id: CardId,
    /// Time of the most recent edit to this entry.
    pub timestamp: DateTime<Utc>,
}

/// Insertion-ordered set of [`StagedChange`]s, at most one per display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingLedger {
    entries: Vec<StagedChange>,
}

impl StagingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an edit of `display_id` from `from_layout` to `to_layout`.
    ///
    /// When the two layouts are equal the display has been reverted to its
    /// baseline and any existing entry is removed.  Otherwise the entry is
    /// inserted, or overwritten in place with a fresh timestamp so that it
    /// keeps its original position in [`list`](Self::list).
    ///
    /// Returns the entry that is now staged, if any.
    pub fn stage(
        &mut self,
        display_id: DisplayId,
        from_layout: &str,
        to_layout: &str,
        card_id: CardId,
        now: DateTime<Utc>,
    ) -> Option<&StagedChange> {
        if from_layout == to_layout {
            self.unstage(display_id);
            return None;
        }

        let change = StagedChange {
            display_id,
            from_layout: from_layout.to_string(),
            to_layout: to_layout.to_string(),
            card_id,
            timestamp: now,
        };

        let idx = match self.position(display_id) {
            Some(idx) => {
                self.entries[idx] = change;
                idx
            }
            None => {
                self.entries.push(change);
                self.entries.len() - 1
            }
        };
        self.entries.get(idx)
    }

    /// Removes the entry for `display_id`, returning it if present.
    pub fn unstage(&mut self, display_id: DisplayId) -> Option<StagedChange> {
        self.position(display_id).map(|idx| self.entries.remove(idx))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries in first-staged order.
    pub fn list(&self) -> &[StagedChange] {
        &self.entries
    }

    pub fn get(&self, display_id: DisplayId) -> Option<&StagedChange> {
        self.entries.iter().find(|c| c.display_id == display_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, display_id: DisplayId) -> Option<usize> {
        self.entries.iter().position(|c| c.display_id == display_id)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
