//! Length-prefixed RCON framing.
//!
//! [`RconCodec::encode`] produces a complete frame ready to write to the
//! socket. [`RconCodec::decode_frame`] is incremental: hand it whatever
//! bytes have been read so far and it either returns a packet plus the
//! number of bytes consumed, or `None` when more data is needed.

use crate::{Packet, PacketKind, RconError};

/// Largest `size` field a client may send (Source RCON limit).
pub const MAX_PACKET_SIZE: usize = 4096;

/// Upper bound on a server frame we are willing to buffer. Servers may
/// exceed [`MAX_PACKET_SIZE`] for long command output, but anything near
/// this size is a corrupt stream.
const MAX_FRAME_SIZE: usize = 1 << 20;

/// `id` + `kind` + two NUL terminators.
const HEADER_AND_TERMINATOR: usize = 4 + 4 + 2;

/// Encoder/decoder for RCON packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct RconCodec;

impl RconCodec {
    /// Serializes a packet into a length-prefixed frame.
    ///
    /// # Errors
    /// - [`RconError::EmbeddedNul`] if the body contains `\0`
    /// - [`RconError::TooLarge`] if the frame exceeds [`MAX_PACKET_SIZE`]
    pub fn encode(&self, packet: &Packet) -> Result<Vec<u8>, RconError> {
        let body = packet.body.as_bytes();
        if body.contains(&0) {
            return Err(RconError::EmbeddedNul);
        }

        let size = HEADER_AND_TERMINATOR + body.len();
        if size > MAX_PACKET_SIZE {
            return Err(RconError::TooLarge(size));
        }

        let mut frame = Vec::with_capacity(4 + size);
        frame.extend_from_slice(&(size as i32).to_le_bytes());
        frame.extend_from_slice(&packet.id.to_le_bytes());
        frame.extend_from_slice(&packet.kind.0.to_le_bytes());
        frame.extend_from_slice(body);
        frame.extend_from_slice(&[0, 0]);
        Ok(frame)
    }

    /// Tries to decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` if `buf` does not yet hold a complete frame.
    /// On success returns the packet and how many bytes it occupied, so
    /// the caller can drain them and keep any trailing bytes for the
    /// next frame.
    pub fn decode_frame(
        &self,
        buf: &[u8],
    ) -> Result<Option<(Packet, usize)>, RconError> {
        let Some(prefix) = buf.get(..4) else {
            return Ok(None);
        };
        let size = i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        if size < HEADER_AND_TERMINATOR as i32 || size as usize > MAX_FRAME_SIZE {
            return Err(RconError::InvalidSize(size));
        }

        let total = 4 + size as usize;
        let Some(frame) = buf.get(..total) else {
            return Ok(None);
        };

        let id = i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        let kind = i32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);
        if frame[total - 2..] != [0, 0] {
            return Err(RconError::MissingTerminator);
        }
        let body = String::from_utf8_lossy(&frame[12..total - 2]).into_owned();

        Ok(Some((
            Packet {
                id,
                kind: PacketKind(kind),
                body,
            },
            total,
        )))
    }
}
