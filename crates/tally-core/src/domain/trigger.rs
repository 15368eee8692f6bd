//! Trigger requests and the results reported back to the operator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::card::CardId;

/// A fully resolved "pulse preset `index` on `ip:port`" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    /// Originating card, if the request came from the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
    pub ip: String,
    pub port: u16,
    pub index: u16,
}

impl TriggerRequest {
    /// Destination key used to group requests that must not overlap.
    pub fn destination(&self) -> (String, u16) {
        (self.ip.clone(), self.port)
    }
}

/// Outcome of one trigger sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
    pub ip: String,
    pub index: u16,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerResult {
    pub fn succeeded(request: &TriggerRequest, message: impl Into<String>) -> Self {
        Self {
            card_id: request.card_id,
            ip: request.ip.clone(),
            index: request.index,
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(
        card_id: Option<CardId>,
        ip: impl Into<String>,
        index: u16,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            card_id,
            ip: ip.into(),
            index,
            success: false,
            message: None,
            error: Some(error.to_string()),
        }
    }
}

/// Results of a batch, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// `true` only if every item succeeded.
    pub success: bool,
    pub results: Vec<TriggerResult>,
}

impl BatchResult {
    pub fn from_results(results: Vec<TriggerResult>) -> Self {
        Self {
            success: results.iter().all(|r| r.success),
            results,
        }
    }
}

/// How operator edits reach the cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Every edit fires its own trigger sequence at once.
    Immediate,
    /// Edits accumulate in the staging ledger until committed.
    #[default]
    Staged,
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::Immediate => f.write_str("immediate"),
            TriggerMode::Staged => f.write_str("staged"),
        }
    }
}

impl std::str::FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(TriggerMode::Immediate),
            "staged" => Ok(TriggerMode::Staged),
            other => Err(format!("unknown trigger mode '{other}' (expected immediate or staged)")),
        }
    }
}
