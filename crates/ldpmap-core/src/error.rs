use ldpmap_transport::TransportError;
use ldpmap_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A dsid or URI was requested from a child file whose parent is gone
    /// or has no URI.
    #[error("invalid parent: {0}")]
    InvalidParent(String),

    #[error("{0} has not been saved")]
    NotPersisted(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unknown metadata property: {0}")]
    UnknownProperty(String),

    #[error("property {name} holds at most one value, got {count}")]
    Cardinality { name: String, count: usize },

    #[error("invalid identifier: {0}")]
    Type(#[from] TypeError),

    /// Propagated unchanged from the transport; nothing here retries.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("content error: {0}")]
    Content(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
