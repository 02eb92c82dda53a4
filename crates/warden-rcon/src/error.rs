//! Error types for the RCON codec.

/// Errors that can occur while framing RCON packets.
#[derive(Debug, thiserror::Error)]
pub enum RconError {
    /// The encoded packet would exceed [`MAX_PACKET_SIZE`](crate::MAX_PACKET_SIZE).
    #[error("packet too large: {0} bytes")]
    TooLarge(usize),

    /// The size prefix is smaller than the fixed header, or negative.
    #[error("invalid packet size: {0}")]
    InvalidSize(i32),

    /// The body contains an interior NUL byte, which would truncate it
    /// on the server side.
    #[error("packet body contains a NUL byte")]
    EmbeddedNul,

    /// The packet is missing its two trailing NUL terminators.
    #[error("packet is missing its terminator")]
    MissingTerminator,
}
