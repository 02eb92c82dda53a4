//! Error types for the version store.

/// Errors that can occur while reading or writing build records.
///
/// A write that fails leaves the previous on-disk value in place; callers
/// must not treat the new identifier as recorded.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Creating the database directory failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite rejected the operation (locked, read-only, corrupt, ...).
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A stored row could not be interpreted.
    #[error("corrupt record for {subject}: {reason}")]
    Corrupt { subject: String, reason: String },
}
