/// Errors from transport operations.
///
/// A transport error means the exchange itself failed. A response that
/// arrived with an unwelcome status is reported through
/// [`UnexpectedStatus`](TransportError::UnexpectedStatus) only when the
/// caller asks for it with [`Status::ensure_success`](crate::Status::ensure_success).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP exchange failed (connection, timeout, body read).
    #[error("{method} {uri} failed: {source}")]
    Http {
        method: &'static str,
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status the caller cannot accept.
    #[error("{method} {uri} returned status {status}")]
    UnexpectedStatus {
        method: &'static str,
        uri: String,
        status: u16,
    },

    /// A header could not be encoded or decoded.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The HTTP client could not be built.
    #[error("client configuration error: {0}")]
    Client(String),

    /// The backend refused the request without answering (injected faults).
    #[error("{method} {uri}: backend unavailable")]
    Unavailable { method: &'static str, uri: String },

    /// A scripted transport received a request nobody stubbed.
    #[error("no stub for {method} {path}")]
    NoStub { method: &'static str, path: String },
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
