//! Player count type and parsing of the server's `players` output.

use std::fmt;

/// Result of a player-count query.
///
/// `Unknown` means the query failed. It is never treated as zero: an
/// empty-server restart is only allowed on a confirmed `Known(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCount {
    Known(u32),
    Unknown,
}

impl PlayerCount {
    /// Raw sentinel for [`PlayerCount::Unknown`].
    pub const UNKNOWN_SENTINEL: i64 = -1;

    /// Converts a raw count where `-1` (or any negative value) means
    /// unknown.
    pub fn from_raw(raw: i64) -> Self {
        match u32::try_from(raw) {
            Ok(n) => Self::Known(n),
            Err(_) => Self::Unknown,
        }
    }

    /// Raw form, `-1` for unknown.
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Known(n) => i64::from(n),
            Self::Unknown => Self::UNKNOWN_SENTINEL,
        }
    }

    /// `true` only for a confirmed empty server.
    pub fn is_empty(self) -> bool {
        self == Self::Known(0)
    }
}

impl fmt::Display for PlayerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(n) => write!(f, "{n}"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

const PLAYERS_MARKER: &str = "Players connected (";

/// Extracts `N` from output like `Players connected (N): alice, bob`.
///
/// Returns `None` if the marker is missing or `N` is not a number; the
/// caller reports that as [`PlayerCount::Unknown`].
pub fn parse_player_count(output: &str) -> Option<u32> {
    let start = output.find(PLAYERS_MARKER)? + PLAYERS_MARKER.len();
    let rest = &output[start..];
    let end = rest.find(')')?;
    rest[..end].trim().parse().ok()
}
