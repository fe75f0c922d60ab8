use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// RDF predicate IRI identifying a metadata property.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(Cow<'static, str>);

impl Predicate {
    /// A predicate backed by a static IRI, usable in `const` items.
    pub const fn from_static(iri: &'static str) -> Self {
        Self(Cow::Borrowed(iri))
    }

    pub fn new(iri: impl Into<String>) -> Self {
        Self(Cow::Owned(iri.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vocabularies the repository speaks.
pub mod vocab {
    /// Dublin Core terms.
    pub mod dc {
        use crate::Predicate;

        pub const TITLE: Predicate = Predicate::from_static("http://purl.org/dc/terms/title");
        pub const CREATOR: Predicate = Predicate::from_static("http://purl.org/dc/terms/creator");
        pub const DESCRIPTION: Predicate =
            Predicate::from_static("http://purl.org/dc/terms/description");
        pub const IDENTIFIER: Predicate =
            Predicate::from_static("http://purl.org/dc/terms/identifier");
    }

    /// EBUCore technical metadata Fedora records for binaries.
    pub mod ebucore {
        use crate::Predicate;

        pub const FILENAME: Predicate = Predicate::from_static(
            "http://www.ebu.ch/metadata/ontologies/ebucore/ebucore#filename",
        );
        pub const HAS_MIME_TYPE: Predicate = Predicate::from_static(
            "http://www.ebu.ch/metadata/ontologies/ebucore/ebucore#hasMimeType",
        );
    }

    /// Linked Data Platform containment.
    pub mod ldp {
        use crate::Predicate;

        pub const CONTAINS: Predicate = Predicate::from_static("http://www.w3.org/ns/ldp#contains");
    }

    /// Fedora model assertions.
    pub mod fedora {
        use crate::Predicate;

        pub const HAS_MODEL: Predicate =
            Predicate::from_static("info:fedora/fedora-system:def/model#hasModel");
    }
}
