//! RCON packet types.

use std::fmt;

// ---------------------------------------------------------------------------
// PacketKind
// ---------------------------------------------------------------------------

/// The `type` field of an RCON packet.
///
/// The numeric values overlap by direction: `2` means "execute command"
/// when the client sends it and "auth response" when the server sends
/// it. That is why this is a newtype over `i32` with named constants
/// rather than an enum: decoding cannot know the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketKind(pub i32);

impl PacketKind {
    /// Client → server: log in with the RCON password.
    pub const AUTH: Self = Self(3);
    /// Server → client: result of an [`AUTH`](Self::AUTH) request.
    pub const AUTH_RESPONSE: Self = Self(2);
    /// Client → server: run a console command.
    pub const EXEC_COMMAND: Self = Self(2);
    /// Server → client: command output.
    pub const RESPONSE_VALUE: Self = Self(0);
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A single RCON packet.
///
/// On the wire:
///
/// ```text
/// <size:i32 LE> <id:i32 LE> <kind:i32 LE> <body bytes> 0x00 0x00
/// ```
///
/// `size` counts everything after itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Request id chosen by the client and echoed back by the server.
    /// The server answers a failed auth with id `-1`.
    pub id: i32,
    pub kind: PacketKind,
    pub body: String,
}

impl Packet {
    /// Request id the server uses to reject an auth attempt.
    pub const AUTH_FAILED_ID: i32 = -1;

    /// Builds an auth request carrying the password.
    pub fn auth(id: i32, password: &str) -> Self {
        Self {
            id,
            kind: PacketKind::AUTH,
            body: password.to_string(),
        }
    }

    /// Builds a command request.
    pub fn command(id: i32, command: &str) -> Self {
        Self {
            id,
            kind: PacketKind::EXEC_COMMAND,
            body: command.to_string(),
        }
    }

    /// `true` if this is the server rejecting an auth attempt.
    pub fn is_auth_failure(&self) -> bool {
        self.id == Self::AUTH_FAILED_ID
    }
}
