//! Object mapping over an LDP repository.
//!
//! Repository objects ([`Base`]) are containers; the binaries attached to
//! them ([`File`]s, a.k.a. datastreams) live one segment below, each with an
//! optional RDF description at `<file uri>/fcr:metadata`.
//!
//! # Key Types
//!
//! - [`Repository`] -- connection context: configuration plus transport
//! - [`File`] / [`FileHandle`] -- a binary and its descriptive fields
//! - [`MetadataNode`] -- typed, change-tracked metadata of a file
//! - [`Base`] / [`ModelSchema`] -- a parent object and its declared files
//! - [`FilesHash`] -- lazily resolved view of an object's files
//! - [`ContentSource`] -- buffers, files and streams as upload content
//!
//! # Design Rules
//!
//! 1. Content is written before metadata; metadata never precedes its file.
//! 2. A new file without content is never saved.
//! 3. Size probes use HEAD and never download the body.
//! 4. Transport errors propagate unchanged; nothing retries.
//! 5. dsids are allocated by one writer per parent.

pub mod base;
pub mod config;
pub mod content;
pub mod error;
pub mod file;
pub mod files_hash;
pub mod metadata;
pub mod parent;
pub mod repository;
pub mod save;

pub use base::{Base, ModelSchema};
pub use config::{RepositoryConfig, SearchConfig};
pub use content::{ContentSource, ReadSeek};
pub use error::{CoreError, CoreResult};
pub use file::{File, FileHandle, FileOptions, FileType};
pub use files_hash::FilesHash;
pub use metadata::{Cardinality, MetadataNode, MetadataSchema, MetadataSchemaBuilder, PropertyDef};
pub use parent::{FileContainer, FileParent};
pub use repository::Repository;
pub use save::{SaveOutcome, SkipReason};

// Re-export the identity and transport types callers need.
pub use ldpmap_transport::{HttpTransport, InMemoryLdpServer, LdpTransport, StubTransport};
pub use ldpmap_types::{next_dsid, vocab, Dsid, Predicate, ResourceUri};
