//! Structured metadata attached to a file.
//!
//! A file type declares its properties once with a [`MetadataSchema`]. Each
//! file then carries a [`MetadataNode`] holding the values, stored remotely
//! as a JSON-LD description at `<file uri>/fcr:metadata`. The node has no
//! identity of its own and is only ever written after its file.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytes::Bytes;
use ldpmap_transport::{Headers, LdpTransport, CONTENT_TYPE, JSON_LD, METADATA_SEGMENT};
use ldpmap_types::{Predicate, ResourceUri};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::save::{SaveOutcome, SkipReason};

/// How many values a property may hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cardinality {
    #[default]
    Many,
    One,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub predicate: Predicate,
    pub cardinality: Cardinality,
}

/// The declared properties of a file type, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataSchema {
    properties: Vec<PropertyDef>,
}

impl MetadataSchema {
    /// Start declaring properties.
    ///
    /// ```
    /// use ldpmap_core::MetadataSchema;
    /// use ldpmap_types::vocab;
    ///
    /// let schema = MetadataSchema::builder()
    ///     .property("title", vocab::dc::TITLE)
    ///     .single("identifier", vocab::dc::IDENTIFIER)
    ///     .build();
    /// assert_eq!(schema.len(), 2);
    /// ```
    pub fn builder() -> MetadataSchemaBuilder {
        MetadataSchemaBuilder::default()
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn by_predicate(&self, iri: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.predicate.as_str() == iri)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MetadataSchemaBuilder {
    properties: Vec<PropertyDef>,
}

impl MetadataSchemaBuilder {
    /// Declare a multi-valued property.
    pub fn property(self, name: &str, predicate: Predicate) -> Self {
        self.declare(name, predicate, Cardinality::Many)
    }

    /// Declare a property holding at most one value.
    pub fn single(self, name: &str, predicate: Predicate) -> Self {
        self.declare(name, predicate, Cardinality::One)
    }

    /// Redeclaring a name replaces the earlier definition in place.
    pub fn declare(mut self, name: &str, predicate: Predicate, cardinality: Cardinality) -> Self {
        let def = PropertyDef {
            name: name.to_string(),
            predicate,
            cardinality,
        };
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = def,
            None => self.properties.push(def),
        }
        self
    }

    pub fn build(self) -> MetadataSchema {
        MetadataSchema {
            properties: self.properties,
        }
    }
}

/// Property values of one file, with local change tracking.
#[derive(Clone, Debug)]
pub struct MetadataNode {
    schema: Arc<MetadataSchema>,
    values: BTreeMap<String, Vec<String>>,
    changed: BTreeSet<String>,
}

impl MetadataNode {
    pub fn new(schema: Arc<MetadataSchema>) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
            changed: BTreeSet::new(),
        }
    }

    pub fn schema(&self) -> &MetadataSchema {
        &self.schema
    }

    /// URI of the description resource for the file at `file_uri`.
    pub fn uri_for(file_uri: &ResourceUri) -> ResourceUri {
        file_uri.join(METADATA_SEGMENT)
    }

    /// Current values of `name`, empty if never set.
    pub fn get(&self, name: &str) -> CoreResult<&[String]> {
        self.def(name)?;
        Ok(self.values.get(name).map(Vec::as_slice).unwrap_or_default())
    }

    /// Replace the values of `name` and mark it changed.
    ///
    /// The change flag is set even when the new values equal the old ones;
    /// it records that the property was written, not that the store differs.
    pub fn set<I, S>(&mut self, name: &str, values: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let def = self.def(name)?;
        if def.cardinality == Cardinality::One && values.len() > 1 {
            return Err(CoreError::Cardinality {
                name: name.to_string(),
                count: values.len(),
            });
        }
        self.values.insert(name.to_string(), values);
        self.changed.insert(name.to_string());
        Ok(())
    }

    /// Whether `name` was set since the node was loaded or last saved.
    pub fn is_changed(&self, name: &str) -> CoreResult<bool> {
        self.def(name)?;
        Ok(self.changed.contains(name))
    }

    /// Names of changed properties, sorted.
    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    pub fn is_dirty(&self) -> bool {
        !self.changed.is_empty()
    }

    /// JSON-LD description of `subject` holding every declared property
    /// that has values.
    pub fn to_json_ld(&self, subject: &ResourceUri) -> Value {
        let mut doc = Map::new();
        doc.insert("@id".into(), Value::String(subject.to_string()));
        for def in self.schema.properties() {
            let Some(values) = self.values.get(&def.name) else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            let literals = values.iter().map(|v| json!({ "@value": v })).collect();
            doc.insert(def.predicate.as_str().to_string(), Value::Array(literals));
        }
        Value::Object(doc)
    }

    /// Rebuild a node from a JSON-LD description.
    ///
    /// Predicates the schema does not declare are ignored. Values may be
    /// `{"@value": ..}` objects or bare strings, singly or in an array.
    pub fn from_json_ld(schema: Arc<MetadataSchema>, doc: &Value) -> Self {
        let mut node = Self::new(schema);
        let Some(object) = doc.as_object() else {
            warn!("metadata document is not a JSON object; ignoring");
            return node;
        };
        for (key, raw) in object {
            let Some(def) = node.schema.by_predicate(key) else {
                continue;
            };
            let name = def.name.clone();
            let items: Vec<&Value> = match raw {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            let values: Vec<String> = items.into_iter().filter_map(literal).collect();
            node.values.insert(name, values);
        }
        node
    }

    /// Fetch the description of the file at `file_uri`.
    ///
    /// A missing description yields an empty node.
    pub fn load(
        schema: Arc<MetadataSchema>,
        transport: &dyn LdpTransport,
        file_uri: &ResourceUri,
    ) -> CoreResult<Self> {
        let uri = Self::uri_for(file_uri);
        let response = transport.get(&uri)?;
        if response.status.is_not_found() {
            return Ok(Self::new(schema));
        }
        response.status.ensure_success("GET", uri.as_str())?;
        let doc: Value = serde_json::from_slice(&response.body)
            .map_err(|e| CoreError::Serialization(format!("{uri}: {e}")))?;
        Ok(Self::from_json_ld(schema, &doc))
    }

    /// Persist the description of the file at `file_uri`.
    ///
    /// Does nothing while the owning file is new: metadata never reaches the
    /// repository ahead of the content it describes.
    pub fn save(
        &mut self,
        transport: &dyn LdpTransport,
        file_uri: &ResourceUri,
        file_is_new: bool,
    ) -> CoreResult<SaveOutcome> {
        if file_is_new {
            debug!(file = %file_uri, "metadata save skipped: file not persisted");
            return Ok(SaveOutcome::Skipped(SkipReason::OwnerNotPersisted));
        }
        if !self.is_dirty() {
            return Ok(SaveOutcome::Skipped(SkipReason::Unchanged));
        }
        let uri = Self::uri_for(file_uri);
        let body = serde_json::to_vec(&self.to_json_ld(file_uri))
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        let headers = Headers::new().with(CONTENT_TYPE, JSON_LD);
        transport
            .put(&uri, Bytes::from(body), &headers)?
            .ensure_success("PUT", uri.as_str())?;
        debug!(uri = %uri, changed = self.changed.len(), "metadata saved");
        self.changed.clear();
        Ok(SaveOutcome::Saved)
    }

    fn def(&self, name: &str) -> CoreResult<&PropertyDef> {
        self.schema
            .property(name)
            .ok_or_else(|| CoreError::UnknownProperty(name.to_string()))
    }
}

fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => match obj.get("@value")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldpmap_transport::{InMemoryLdpServer, Method, Status};
    use ldpmap_types::vocab;
    use proptest::prelude::*;

    fn schema() -> Arc<MetadataSchema> {
        Arc::new(
            MetadataSchema::builder()
                .property("title", vocab::dc::TITLE)
                .property("creator", vocab::dc::CREATOR)
                .single("identifier", vocab::dc::IDENTIFIER)
                .build(),
        )
    }

    fn file_uri() -> ResourceUri {
        ResourceUri::parse("http://localhost:8983/fedora/rest/test/1234/abcd").unwrap()
    }

    fn store_binary(server: &InMemoryLdpServer, uri: &ResourceUri) {
        server
            .put(uri, Bytes::from_static(b"Hey"), &Headers::new())
            .unwrap();
    }

    #[test]
    fn set_then_get_preserves_sequence() {
        let mut node = MetadataNode::new(schema());
        node.set("title", ["one", "two"]).unwrap();
        assert_eq!(node.get("title").unwrap(), ["one", "two"]);
        assert!(node.is_changed("title").unwrap());
        assert!(!node.is_changed("creator").unwrap());
    }

    #[test]
    fn duplicates_are_kept() {
        let mut node = MetadataNode::new(schema());
        node.set("creator", ["b", "a", "b"]).unwrap();
        assert_eq!(node.get("creator").unwrap(), ["b", "a", "b"]);
    }

    #[test]
    fn unset_property_is_empty() {
        let node = MetadataNode::new(schema());
        assert!(node.get("title").unwrap().is_empty());
        assert!(!node.is_dirty());
    }

    #[test]
    fn unknown_property_is_an_error() {
        let mut node = MetadataNode::new(schema());
        assert!(matches!(node.get("nope"), Err(CoreError::UnknownProperty(_))));
        assert!(matches!(node.set("nope", ["x"]), Err(CoreError::UnknownProperty(_))));
        assert!(matches!(node.is_changed("nope"), Err(CoreError::UnknownProperty(_))));
    }

    #[test]
    fn single_valued_property_rejects_many() {
        let mut node = MetadataNode::new(schema());
        let err = node.set("identifier", ["a", "b"]).unwrap_err();
        assert!(matches!(err, CoreError::Cardinality { count: 2, .. }));
        node.set("identifier", ["a"]).unwrap();
        assert_eq!(node.get("identifier").unwrap(), ["a"]);
    }

    #[test]
    fn setting_same_value_still_marks_changed() {
        let mut node = MetadataNode::from_json_ld(
            schema(),
            &json!({ "http://purl.org/dc/terms/title": [{ "@value": "foo" }] }),
        );
        assert!(!node.is_changed("title").unwrap());
        node.set("title", ["foo"]).unwrap();
        assert!(node.is_changed("title").unwrap());
    }

    #[test]
    fn redeclaring_replaces_in_place() {
        let schema = MetadataSchema::builder()
            .property("title", vocab::dc::TITLE)
            .property("creator", vocab::dc::CREATOR)
            .single("title", vocab::dc::TITLE)
            .build();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.properties()[0].name, "title");
        assert_eq!(schema.properties()[0].cardinality, Cardinality::One);
    }

    #[test]
    fn json_ld_shape() {
        let mut node = MetadataNode::new(schema());
        node.set("title", ["foo"]).unwrap();
        let doc = node.to_json_ld(&file_uri());
        assert_eq!(
            doc,
            json!({
                "@id": "http://localhost:8983/fedora/rest/test/1234/abcd",
                "http://purl.org/dc/terms/title": [{ "@value": "foo" }],
            })
        );
    }

    #[test]
    fn json_ld_accepts_loose_shapes() {
        let doc = json!({
            "@id": "http://h/x",
            "http://purl.org/dc/terms/title": "bare",
            "http://purl.org/dc/terms/creator": ["a", { "@value": "b" }, { "@id": "http://h/ref" }],
            "http://example.org/unknown": ["ignored"],
        });
        let node = MetadataNode::from_json_ld(schema(), &doc);
        assert_eq!(node.get("title").unwrap(), ["bare"]);
        assert_eq!(node.get("creator").unwrap(), ["a", "b"]);
    }

    #[test]
    fn save_skipped_while_file_is_new() {
        let server = InMemoryLdpServer::new();
        let mut node = MetadataNode::new(schema());
        node.set("title", ["foo"]).unwrap();

        let outcome = node.save(&server, &file_uri(), true).unwrap();
        assert_eq!(outcome, SaveOutcome::Skipped(SkipReason::OwnerNotPersisted));
        assert!(server.calls().is_empty());
        assert!(node.is_dirty());
    }

    #[test]
    fn save_unchanged_is_skipped() {
        let server = InMemoryLdpServer::new();
        let mut node = MetadataNode::new(schema());
        let outcome = node.save(&server, &file_uri(), false).unwrap();
        assert_eq!(outcome, SaveOutcome::Skipped(SkipReason::Unchanged));
        assert!(server.calls().is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let server = InMemoryLdpServer::new();
        let uri = file_uri();
        store_binary(&server, &uri);

        let mut node = MetadataNode::new(schema());
        node.set("title", ["foo", "bar"]).unwrap();
        assert_eq!(node.save(&server, &uri, false).unwrap(), SaveOutcome::Saved);
        assert!(!node.is_dirty());
        assert_eq!(
            server.calls_with(Method::Put).last().map(String::as_str),
            Some("http://localhost:8983/fedora/rest/test/1234/abcd/fcr:metadata")
        );

        let loaded = MetadataNode::load(schema(), &server, &uri).unwrap();
        assert_eq!(loaded.get("title").unwrap(), ["foo", "bar"]);
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn save_against_missing_binary_fails() {
        let server = InMemoryLdpServer::new();
        let mut node = MetadataNode::new(schema());
        node.set("title", ["foo"]).unwrap();
        let err = node.save(&server, &file_uri(), false).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Transport(ldpmap_transport::TransportError::UnexpectedStatus { status: 404, .. })
        ));
        assert!(node.is_dirty());
    }

    #[test]
    fn load_missing_description_is_empty() {
        let server = InMemoryLdpServer::new();
        let node = MetadataNode::load(schema(), &server, &file_uri()).unwrap();
        assert!(node.get("title").unwrap().is_empty());
    }

    #[test]
    fn load_rejects_garbage() {
        let server = InMemoryLdpServer::new();
        let uri = file_uri();
        store_binary(&server, &uri);
        let status = server
            .put(
                &MetadataNode::uri_for(&uri),
                Bytes::from_static(b"not json"),
                &Headers::new().with(CONTENT_TYPE, "text/plain"),
            )
            .unwrap();
        assert_eq!(status, Status::CREATED);
        let err = MetadataNode::load(schema(), &server, &uri).unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    proptest! {
        #[test]
        fn json_ld_roundtrip_preserves_values(titles in proptest::collection::vec(".{0,12}", 0..6)) {
            let mut node = MetadataNode::new(schema());
            node.set("title", titles.clone()).unwrap();
            let doc = node.to_json_ld(&file_uri());
            let back = MetadataNode::from_json_ld(schema(), &doc);
            prop_assert_eq!(back.get("title").unwrap(), titles.as_slice());
        }
    }
}
