//! JSON request and response bodies of the HTTP API.
//!
//! Field names are camelCase on the wire, matching the operator UI.
//!
//! Request bodies are deliberately loose (`Option` fields, `serde_json::Value`
//! for the index) so that a missing or mistyped field produces the API's own
//! error message instead of a generic deserialization rejection.  The
//! `validate` helpers below turn a loose body into a typed request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_core::{CardId, DisplayId, TriggerMode, TriggerRequest};

pub const ERR_IP_REQUIRED: &str = "IP address required";
pub const ERR_INDEX_REQUIRED: &str = "Valid index required (1 or higher)";
pub const ERR_TRIGGERS_REQUIRED: &str = "Triggers array required";
pub const ERR_INVALID_TRIGGER: &str = "Invalid trigger parameters";

// ── Responses ─────────────────────────────────────────────────────────────────

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn ok(now: DateTime<Utc>) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: now,
        }
    }
}

/// Generic `{success, message | error}` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Body of `GET /mode` and `PUT /mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: TriggerMode,
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Body of `POST /test`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestBody {
    pub ip: Option<String>,
    pub port: Option<u16>,
}

/// Body of `POST /trigger` and one element of `POST /trigger-batch`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBody {
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub index: Option<Value>,
    pub card_id: Option<CardId>,
}

/// Why a [`TriggerBody`] was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerBodyError {
    MissingIp,
    InvalidIndex,
}

impl TriggerBodyError {
    pub fn message(self) -> &'static str {
        match self {
            TriggerBodyError::MissingIp => ERR_IP_REQUIRED,
            TriggerBodyError::InvalidIndex => ERR_INDEX_REQUIRED,
        }
    }
}

impl TriggerBody {
    /// Turns the loose body into a [`TriggerRequest`].
    ///
    /// # Errors
    ///
    /// - [`TriggerBodyError::MissingIp`] if `ip` is absent or blank.
    /// - [`TriggerBodyError::InvalidIndex`] if `index` is not an integer ≥ 1.
    pub fn validate(&self, default_port: u16) -> Result<TriggerRequest, TriggerBodyError> {
        let ip = self
            .ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .ok_or(TriggerBodyError::MissingIp)?;
        let index = self
            .index
            .as_ref()
            .and_then(parse_index)
            .ok_or(TriggerBodyError::InvalidIndex)?;
        Ok(TriggerRequest {
            card_id: self.card_id,
            ip: ip.to_string(),
            port: self.port.unwrap_or(default_port),
            index,
        })
    }
}

/// Reads a JSON index: an integer ≥ 1.  Values past the 16-bit wire field
/// wrap modulo 65536.
pub fn parse_index(value: &Value) -> Option<u16> {
    let n = value.as_u64().filter(|&n| n >= 1)?;
    Some((n % 65_536) as u16)
}

/// Body of `POST /trigger-batch`.
///
/// Elements stay untyped so one malformed entry fails on its own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchBody {
    pub triggers: Option<Vec<Value>>,
}

/// Body of `POST /staged`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageBody {
    pub display_id: DisplayId,
    pub from_layout: String,
    pub to_layout: String,
    pub card_id: CardId,
}

/// Body of `POST /layout-change`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutChangeBody {
    pub display_id: DisplayId,
    pub layout: String,
}

/// Query string of `GET /layouts`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutsQuery {
    pub max_inputs: Option<u8>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
