//! Wire protocol for the game server's remote console (Source RCON).
//!
//! This crate only knows how to turn packets into bytes and back:
//!
//! - **Types** ([`Packet`], [`PacketKind`]): what travels on the wire.
//! - **Codec** ([`RconCodec`]): length-prefixed framing, encode/decode.
//! - **Errors** ([`RconError`]): what can go wrong while framing.
//!
//! It does not open sockets. The control layer owns the TCP connection
//! and feeds received bytes through [`RconCodec::decode_frame`].
//!
//! ```text
//! TCP (bytes) → Codec (Packet) → Control (commands, replies)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{RconCodec, MAX_PACKET_SIZE};
pub use error::RconError;
pub use types::{Packet, PacketKind};
