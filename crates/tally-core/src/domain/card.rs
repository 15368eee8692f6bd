//! Card registry: the fixed 22-slot roster of multiviewer card endpoints.
//!
//! Every physical card is addressed by a small integer (`1..=22`) and an IPv4
//! endpoint.  Slots are created once at configuration time and are never
//! deleted; operators only edit their address, port, label and enabled flag.
//!
//! # Validation
//!
//! Edits go through [`CardRegistry::update`], which validates the *merged*
//! result before committing it.  A rejected edit leaves the previous value
//! untouched, so a typo in the UI can never corrupt a working card entry.
//!
//! An empty IP address is accepted (it means "not configured yet") but only
//! for a disabled card: an enabled card always carries a valid dotted quad.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a physical multiviewer card (`1..=CARD_COUNT`).
pub type CardId = u8;

/// Number of card slots in the registry.
pub const CARD_COUNT: u8 = 22;

/// Default TCP/UDP port the cards listen on for TSL 5.0 tally packets.
pub const DEFAULT_CARD_PORT: u16 = 8902;

/// Error type for card registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The proposed endpoint failed validation; the previous value was kept.
    #[error("invalid endpoint for card {card_id}: {reason}")]
    InvalidEndpoint { card_id: CardId, reason: String },

    /// The card id is outside `1..=CARD_COUNT`.
    #[error("unknown card: {0}")]
    UnknownCard(CardId),
}

/// Network endpoint and state for a single card slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEndpoint {
    pub card_id: CardId,
    /// Operator-facing name shown in the pending-changes panel.
    #[serde(default)]
    pub label: String,
    /// IPv4 dotted quad, or empty while the card is not configured.
    #[serde(default)]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub enabled: bool,
}

fn default_port() -> u16 {
    DEFAULT_CARD_PORT
}

impl CardEndpoint {
    /// Creates an unconfigured, disabled slot.
    pub fn unconfigured(card_id: CardId) -> Self {
        Self {
            card_id,
            label: format!("MV {card_id}"),
            ip: String::new(),
            port: DEFAULT_CARD_PORT,
            enabled: false,
        }
    }

    /// Returns the socket address, or `None` when the IP is empty or invalid.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let ip: Ipv4Addr = self.ip.parse().ok()?;
        Some(SocketAddr::V4(SocketAddrV4::new(ip, self.port)))
    }
}

/// A partial edit to a card endpoint.  `None` fields keep their current value.
///
/// `port` is deliberately wider than `u16` so that out-of-range values coming
/// from the UI surface as [`RegistryError::InvalidEndpoint`] instead of a
/// deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUpdate {
    pub ip: Option<String>,
    pub port: Option<u32>,
    pub enabled: Option<bool>,
    pub label: Option<String>,
}

/// In-memory roster of all card slots.
///
/// Slots are stored in a `Vec` indexed by `card_id - 1`; the roster size never
/// changes after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRegistry {
    cards: Vec<CardEndpoint>,
}

impl Default for CardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CardRegistry {
    /// Creates a registry with every slot unconfigured and disabled.
    pub fn new() -> Self {
        Self {
            cards: (1..=CARD_COUNT).map(CardEndpoint::unconfigured).collect(),
        }
    }

    /// Seeds a registry from persisted entries.
    ///
    /// Slots not mentioned in `entries` stay unconfigured.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure encountered.
    pub fn from_entries<I>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = CardEndpoint>,
    {
        let mut registry = Self::new();
        for entry in entries {
            registry.update(
                entry.card_id,
                EndpointUpdate {
                    ip: Some(entry.ip),
                    port: Some(u32::from(entry.port)),
                    enabled: Some(entry.enabled),
                    label: Some(entry.label).filter(|l| !l.is_empty()),
                },
            )?;
        }
        Ok(registry)
    }

    /// Returns the endpoint for `card_id`, or `None` if the id is out of range.
    pub fn get(&self, card_id: CardId) -> Option<&CardEndpoint> {
        Self::slot(card_id).and_then(|i| self.cards.get(i))
    }

    /// Returns every slot in card-id order.
    pub fn all(&self) -> &[CardEndpoint] {
        &self.cards
    }

    /// Returns the enabled slots in card-id order.
    pub fn enabled(&self) -> impl Iterator<Item = &CardEndpoint> {
        self.cards.iter().filter(|c| c.enabled)
    }

    /// Applies a validated edit to a card slot.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownCard`] if `card_id` is out of range.
    /// - [`RegistryError::InvalidEndpoint`] if the merged endpoint has a port
    ///   outside `1..=65535`, a malformed IPv4 address, or is enabled without
    ///   an address.  The stored value is unchanged in that case.
    pub fn update(
        &mut self,
        card_id: CardId,
        update: EndpointUpdate,
    ) -> Result<&CardEndpoint, RegistryError> {
        let idx = Self::slot(card_id).ok_or(RegistryError::UnknownCard(card_id))?;
        let current = &self.cards[idx];

        let invalid = |reason: String| RegistryError::InvalidEndpoint { card_id, reason };

        let port = match update.port {
            Some(p) if (1..=u32::from(u16::MAX)).contains(&p) => p as u16,
            Some(p) => return Err(invalid(format!("port {p} is outside 1..=65535"))),
            None => current.port,
        };

        let ip = match update.ip {
            Some(ip) => {
                let ip = ip.trim().to_string();
                if !ip.is_empty() && ip.parse::<Ipv4Addr>().is_err() {
                    return Err(invalid(format!("'{ip}' is not an IPv4 dotted quad")));
                }
                ip
            }
            None => current.ip.clone(),
        };

        let enabled = update.enabled.unwrap_or(current.enabled);
        if enabled && ip.is_empty() {
            return Err(invalid("an enabled card needs an IP address".to_string()));
        }

        let label = update.label.unwrap_or_else(|| current.label.clone());

        self.cards[idx] = CardEndpoint {
            card_id,
            label,
            ip,
            port,
            enabled,
        };
        Ok(&self.cards[idx])
    }

    fn slot(card_id: CardId) -> Option<usize> {
        (1..=CARD_COUNT)
            .contains(&card_id)
            .then(|| usize::from(card_id - 1))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
