//! Foundation types for ldpmap.
//!
//! This crate provides the identity types shared by the transport and the
//! object-mapping layer. Every other ldpmap crate depends on `ldpmap-types`.
//!
//! # Key Types
//!
//! - [`ResourceUri`] -- Absolute URI of a repository resource
//! - [`Dsid`] -- Datastream id, unique among the files of one parent
//! - [`next_dsid`] -- Prefix-scoped dsid allocation
//! - [`Predicate`] -- RDF predicate IRI naming a metadata property
//! - [`vocab`] -- Well-known predicates (Dublin Core, EBUCore, LDP, Fedora model)

pub mod dsid;
pub mod error;
pub mod predicate;
pub mod uri;

pub use dsid::{next_dsid, validate_prefix, Dsid, DEFAULT_DSID_PREFIX};
pub use error::TypeError;
pub use predicate::{vocab, Predicate};
pub use uri::ResourceUri;
