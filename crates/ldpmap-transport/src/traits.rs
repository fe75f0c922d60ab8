use bytes::Bytes;
use ldpmap_types::ResourceUri;

use crate::error::TransportResult;
use crate::response::{GetResponse, HeadResponse, Headers, Status};

/// Synchronous LDP transport.
///
/// All implementations must satisfy these invariants:
/// - Every call blocks the caller until the exchange completes. There is no
///   retry at this layer; timeouts belong to the implementation.
/// - `Err` means the exchange failed. A response with any status, including
///   404 or 5xx, is `Ok` and the caller interprets it.
/// - `head` never transfers a body.
/// - `put` creates or replaces the resource at `uri` with `body`, recording
///   the supplied headers (content type, disposition).
/// - `delete` removes the resource and everything below it.
pub trait LdpTransport: Send + Sync {
    /// Fetch status and headers without the body.
    fn head(&self, uri: &ResourceUri) -> TransportResult<HeadResponse>;

    /// Fetch status, headers and body.
    fn get(&self, uri: &ResourceUri) -> TransportResult<GetResponse>;

    /// Create or replace the resource at `uri`.
    fn put(&self, uri: &ResourceUri, body: Bytes, headers: &Headers) -> TransportResult<Status>;

    /// Delete the resource at `uri`.
    fn delete(&self, uri: &ResourceUri) -> TransportResult<Status>;

    /// Whether a resource answers HEAD with a 2xx.
    ///
    /// Default implementation issues a `head()`.
    fn exists(&self, uri: &ResourceUri) -> TransportResult<bool> {
        Ok(self.head(uri)?.status.is_success())
    }
}

/// HTTP method of a recorded exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Head,
    Get,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Head => "HEAD",
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exchange seen by a test transport, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: Method,
    pub uri: String,
}

impl RecordedCall {
    pub fn new(method: Method, uri: &ResourceUri) -> Self {
        Self {
            method,
            uri: uri.to_string(),
        }
    }
}
