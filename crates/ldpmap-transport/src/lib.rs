//! LDP transport for ldpmap.
//!
//! The object-mapping layer talks to the repository only through the
//! [`LdpTransport`] trait: four blocking verbs over absolute resource URIs.
//! HEAD is what lets the mapping layer learn a binary's size without
//! downloading it.
//!
//! # Backends
//!
//! - [`HttpTransport`] -- blocking `reqwest` client for a live server
//! - [`InMemoryLdpServer`] -- `BTreeMap`-based LDP emulation for tests and embedding
//! - [`StubTransport`] -- scripted responses keyed by method and path
//!
//! # Design Rules
//!
//! 1. Calls are synchronous; no retries at this layer.
//! 2. Any response is `Ok`; `Err` means the exchange itself failed.
//! 3. Header names are case-insensitive.

pub mod error;
pub mod http;
pub mod memory;
pub mod response;
pub mod stub;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use memory::{InMemoryLdpServer, METADATA_SEGMENT};
pub use response::{
    attachment_disposition, GetResponse, HeadResponse, Headers, Status, CONTENT_DISPOSITION,
    CONTENT_LENGTH, CONTENT_TYPE, ETAG, JSON_LD, OCTET_STREAM,
};
pub use stub::StubTransport;
pub use traits::{LdpTransport, Method, RecordedCall};
