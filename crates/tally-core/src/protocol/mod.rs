//! Protocol module containing the TSL 5.0 tally packet codec.

pub mod tsl5;

pub use tsl5::{decode_tally, encode_tally, PacketError, TallyPacket};
