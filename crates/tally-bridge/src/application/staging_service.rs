//! StagingStore: the shared, lock-guarded pending-changes ledger.
//!
//! Operators edit displays one at a time.  Depending on the current
//! [`TriggerMode`] an edit either fires its trigger straight away
//! (`immediate`) or lands in the [`StagingLedger`] (`staged`) until the
//! operator commits the whole set.
//!
//! The store is created once in `main.rs` and handed to the HTTP layer as an
//! `Arc<StagingStore>`; there is no global instance.  All state sits behind
//! Tokio locks that are never held across a trigger sequence.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use tally_core::{
    CardId, DisplayId, LayoutError, MultiviewerBank, MultiviewerCard, Side, StagedChange,
    StagingLedger, TriggerMode, TriggerRequest, TriggerResult,
};

use crate::application::trigger_service::TriggerService;

pub const NOTHING_STAGED: &str = "No staged layouts to trigger";

/// Result of [`StagingStore::commit_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub results: Vec<TriggerResult>,
}

/// What happened to one layout edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum LayoutChangeOutcome {
    /// Immediate mode: the trigger ran.
    Triggered { result: TriggerResult },
    /// Staged mode: the ledger entry now in place, or `None` after a revert.
    Staged { change: Option<StagedChange> },
}

/// Reply of [`StagingStore::apply_layout_change`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedLayoutChange {
    pub display_id: DisplayId,
    pub previous: Option<String>,
    pub side2_cleared: bool,
    #[serde(flatten)]
    pub outcome: LayoutChangeOutcome,
}

pub struct StagingStore {
    ledger: Mutex<StagingLedger>,
    bank: Mutex<MultiviewerBank>,
    mode: RwLock<TriggerMode>,
    trigger: Arc<TriggerService>,
}

impl StagingStore {
    pub fn new(trigger: Arc<TriggerService>, mode: TriggerMode) -> Self {
        Self {
            ledger: Mutex::new(StagingLedger::new()),
            bank: Mutex::new(MultiviewerBank::with_defaults()),
            mode: RwLock::new(mode),
            trigger,
        }
    }

    pub async fn mode(&self) -> TriggerMode {
        *self.mode.read().await
    }

    pub async fn set_mode(&self, mode: TriggerMode) {
        info!(%mode, "trigger mode changed");
        *self.mode.write().await = mode;
    }

    // ── Ledger operations ─────────────────────────────────────────────────────

    /// Stages `from → to` for `display_id`; equal layouts cancel the entry.
    pub async fn stage(
        &self,
        display_id: DisplayId,
        from: &str,
        to: &str,
        card_id: CardId,
    ) -> Option<StagedChange> {
        let mut ledger = self.ledger.lock().await;
        let staged = ledger
            .stage(display_id, from, to, card_id, Utc::now())
            .cloned();
        debug!(%display_id, from, to, staged = staged.is_some(), "stage");
        staged
    }

    pub async fn unstage(&self, display_id: DisplayId) -> Option<StagedChange> {
        self.ledger.lock().await.unstage(display_id)
    }

    pub async fn clear(&self) {
        self.ledger.lock().await.clear();
    }

    pub async fn list(&self) -> Vec<StagedChange> {
        self.ledger.lock().await.list().to_vec()
    }

    // ── Commit ────────────────────────────────────────────────────────────────

    /// Triggers every staged change whose card is present and enabled.
    ///
    /// On overall success the committed entries are removed; entries staged
    /// again while the batch was running stay.  On any failure every entry
    /// stays so the operator can retry.
    pub async fn commit_all(&self) -> CommitOutcome {
        let snapshot = self.list().await;

        let requests: Vec<TriggerRequest> = {
            let registry = self.trigger.registry().read().await;
            let catalog = self.trigger.catalog();
            snapshot
                .iter()
                .filter_map(|change| {
                    let card = registry.get(change.card_id).filter(|c| c.enabled)?;
                    Some(TriggerRequest {
                        card_id: Some(change.card_id),
                        ip: card.ip.clone(),
                        port: card.port,
                        index: catalog.tally_index_of(&change.to_layout),
                    })
                })
                .collect()
        };

        if requests.is_empty() {
            info!(staged = snapshot.len(), "commit skipped: nothing to trigger");
            return CommitOutcome {
                success: true,
                message: Some(NOTHING_STAGED.to_string()),
                results: Vec::new(),
            };
        }

        let batch = self.trigger.trigger_batch(requests).await;

        if batch.success {
            let mut ledger = self.ledger.lock().await;
            for change in &snapshot {
                if ledger.get(change.display_id) == Some(change) {
                    ledger.unstage(change.display_id);
                }
            }
            info!(committed = snapshot.len(), "staged layouts committed");
        } else {
            info!(staged = snapshot.len(), "commit failed; staged layouts kept");
        }

        CommitOutcome {
            success: batch.success,
            message: None,
            results: batch.results,
        }
    }

    // ── Mode dispatch ─────────────────────────────────────────────────────────

    /// Routes one edit according to the current mode.
    pub async fn handle_layout_change(
        &self,
        display_id: DisplayId,
        from: &str,
        to: &str,
        card_id: CardId,
    ) -> LayoutChangeOutcome {
        match self.mode().await {
            TriggerMode::Immediate => LayoutChangeOutcome::Triggered {
                result: self.trigger.trigger_one(card_id, to).await,
            },
            TriggerMode::Staged => LayoutChangeOutcome::Staged {
                change: self.stage(display_id, from, to, card_id).await,
            },
        }
    }

    /// Sets the layout of a display in the multiviewer bank and routes it.
    ///
    /// The baseline for staging is the layout the display had before its
    /// first pending edit, so stepping back to it cancels the entry.  When a
    /// side-1 change pushes side 2 out of the shared input bank, side 2's
    /// pending entry is dropped along with its layout.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] if the layout is unknown or does not fit;
    /// the bank is unchanged in that case.
    pub async fn apply_layout_change(
        &self,
        display_id: DisplayId,
        layout: &str,
    ) -> Result<AppliedLayoutChange, LayoutError> {
        let change = {
            let mut bank = self.bank.lock().await;
            bank.card_mut(display_id.card_id)?.set_layout(
                display_id.side,
                Some(layout),
                self.trigger.catalog(),
            )?
        };

        if change.side2_cleared {
            self.unstage(DisplayId::new(display_id.card_id, Side::Two))
                .await;
        }

        let baseline = {
            let ledger = self.ledger.lock().await;
            ledger
                .get(display_id)
                .map(|c| c.from_layout.clone())
                .or_else(|| change.previous.clone())
                .unwrap_or_default()
        };

        let outcome = self
            .handle_layout_change(display_id, &baseline, layout, display_id.card_id)
            .await;

        Ok(AppliedLayoutChange {
            display_id,
            previous: change.previous,
            side2_cleared: change.side2_cleared,
            outcome,
        })
    }

    pub async fn cards(&self) -> Vec<MultiviewerCard> {
        self.bank.lock().await.cards().to_vec()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
