use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid resource uri {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("dsid must not be empty")]
    EmptyDsid,

    #[error("invalid dsid {dsid:?}: {reason}")]
    InvalidDsid { dsid: String, reason: String },

    #[error("invalid dsid prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}
