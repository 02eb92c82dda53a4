//! Version store for Warden.
//!
//! Remembers the last build identifier seen for the game and for each
//! tracked addon, in a small SQLite database that survives restarts of
//! the monitor. The single interesting operation is
//! [`VersionStore::record_and_diff`]: compare, and persist only if
//! different, in one transaction.

mod error;
mod store;
mod subject;

pub use error::StoreError;
pub use store::{BuildRecord, VersionStore};
pub use subject::Subject;
