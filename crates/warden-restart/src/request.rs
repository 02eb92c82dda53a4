//! Restart requests and their reasons.

use std::fmt;

use chrono::{DateTime, Utc};

/// Why a restart is wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// The game build changed.
    GameUpdate,
    /// One or more workshop addons changed.
    ModUpdate(Vec<String>),
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GameUpdate => write!(f, "game update"),
            Self::ModUpdate(ids) => write!(f, "mod update ({})", ids.join(", ")),
        }
    }
}

/// A request to restart the server, created when the version store
/// reports a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    pub reasons: Vec<RestartReason>,
    pub created_at: DateTime<Utc>,
}

impl RestartRequest {
    pub fn new(reasons: Vec<RestartReason>) -> Self {
        Self {
            reasons,
            created_at: Utc::now(),
        }
    }

    pub fn game_update() -> Self {
        Self::new(vec![RestartReason::GameUpdate])
    }

    pub fn mod_update(ids: Vec<String>) -> Self {
        Self::new(vec![RestartReason::ModUpdate(ids)])
    }

    /// Comma-separated reasons, for logs.
    pub fn describe(&self) -> String {
        describe_reasons(&self.reasons)
    }
}

pub(crate) fn describe_reasons(reasons: &[RestartReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Folds `incoming` into `pending` without duplicates: at most one
/// `GameUpdate`, and one `ModUpdate` holding the union of addon ids.
pub(crate) fn merge_reasons(pending: &mut Vec<RestartReason>, incoming: Vec<RestartReason>) {
    for reason in incoming {
        match reason {
            RestartReason::GameUpdate => {
                if !pending.contains(&RestartReason::GameUpdate) {
                    pending.push(RestartReason::GameUpdate);
                }
            }
            RestartReason::ModUpdate(ids) => {
                let existing = pending.iter_mut().find_map(|r| match r {
                    RestartReason::ModUpdate(existing) => Some(existing),
                    RestartReason::GameUpdate => None,
                });
                match existing {
                    Some(existing) => {
                        for id in ids {
                            if !existing.contains(&id) {
                                existing.push(id);
                            }
                        }
                    }
                    None => pending.push(RestartReason::ModUpdate(ids)),
                }
            }
        }
    }
}
