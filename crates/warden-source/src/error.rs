//! Error types for update lookups.

/// Errors from querying the upstream update source.
///
/// All of these are transient from the monitor's point of view: the
/// subject is skipped this cycle and queried again on the next one.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response parsed but did not contain the expected field.
    #[error("response is missing {0}")]
    MissingField(String),

    /// The workshop item does not exist or is not visible.
    #[error("workshop item {0} not found")]
    AddonNotFound(String),

    /// Building the HTTP client failed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}
