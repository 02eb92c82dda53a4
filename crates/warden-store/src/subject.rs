//! What a build identifier belongs to.

use std::fmt;

/// The thing whose build identifier is tracked.
///
/// Identity of a stored record is its subject: one row per subject,
/// replaced whenever a different identifier is observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// The game itself, keyed by Steam app id.
    Game(String),
    /// A workshop addon, keyed by workshop item id.
    Mod(String),
}

impl Subject {
    pub(crate) const GAME_KIND: &'static str = "game";
    pub(crate) const MOD_KIND: &'static str = "mod";

    /// Storage discriminator (`game` or `mod`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Game(_) => Self::GAME_KIND,
            Self::Mod(_) => Self::MOD_KIND,
        }
    }

    /// App id or workshop item id.
    pub fn item_id(&self) -> &str {
        match self {
            Self::Game(id) | Self::Mod(id) => id,
        }
    }

    /// Rebuilds a subject from its stored `(kind, item_id)` pair.
    pub(crate) fn from_parts(kind: &str, item_id: String) -> Option<Self> {
        match kind {
            Self::GAME_KIND => Some(Self::Game(item_id)),
            Self::MOD_KIND => Some(Self::Mod(item_id)),
            _ => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.item_id())
    }
}
