use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use ldpmap_types::{vocab, ResourceUri};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::response::{
    GetResponse, HeadResponse, Headers, Status, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE,
    ETAG, JSON_LD, OCTET_STREAM,
};
use crate::traits::{LdpTransport, Method, RecordedCall};

/// Last path segment of a binary's description resource.
pub const METADATA_SEGMENT: &str = "fcr:metadata";

#[derive(Clone, Debug)]
struct StoredResource {
    body: Bytes,
    headers: Headers,
}

/// In-memory LDP server.
///
/// Intended for tests and embedding. Resources live in a `BTreeMap` keyed by
/// URI behind a `RwLock`. It behaves like the repository where the mapping
/// layer can observe it:
///
/// - HEAD reports `Content-Length`, `Content-Type`, `Content-Disposition`
///   and a strong `ETag` (BLAKE3 of the body).
/// - GET of a JSON-LD resource lists its direct children under
///   `ldp:contains`.
/// - PUT to `<binary>/fcr:metadata` answers 404 unless the binary exists.
/// - DELETE removes the resource and everything below it.
///
/// Every exchange is recorded so tests can assert on ordering, and writes
/// to chosen URIs can be made to fail.
pub struct InMemoryLdpServer {
    resources: RwLock<BTreeMap<String, StoredResource>>,
    calls: RwLock<Vec<RecordedCall>>,
    unavailable: RwLock<BTreeSet<String>>,
}

impl InMemoryLdpServer {
    /// Create a new empty server.
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            calls: RwLock::new(Vec::new()),
            unavailable: RwLock::new(BTreeSet::new()),
        }
    }

    /// Number of stored resources.
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    /// Sorted URIs of all stored resources.
    pub fn uris(&self) -> Vec<String> {
        self.resources.read().keys().cloned().collect()
    }

    /// Stored body of a resource, bypassing the call log.
    pub fn body(&self, uri: &ResourceUri) -> Option<Bytes> {
        self.resources
            .read()
            .get(uri.as_str())
            .map(|r| r.body.clone())
    }

    /// All recorded exchanges, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().clone()
    }

    /// URIs of recorded exchanges with the given method, oldest first.
    pub fn calls_with(&self, method: Method) -> Vec<String> {
        self.calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.uri.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    /// Make PUT and DELETE against `uri` fail with
    /// [`TransportError::Unavailable`] until [`restore`](Self::restore).
    pub fn fail_writes_to(&self, uri: &ResourceUri) {
        self.unavailable.write().insert(uri.to_string());
    }

    pub fn restore(&self, uri: &ResourceUri) {
        self.unavailable.write().remove(uri.as_str());
    }

    fn record(&self, method: Method, uri: &ResourceUri) {
        debug!(method = %method, uri = %uri, "ldp request");
        self.calls.write().push(RecordedCall::new(method, uri));
    }

    fn check_available(&self, method: Method, uri: &ResourceUri) -> TransportResult<()> {
        if self.unavailable.read().contains(uri.as_str()) {
            return Err(TransportError::Unavailable {
                method: method.as_str(),
                uri: uri.to_string(),
            });
        }
        Ok(())
    }

    fn response_headers(resource: &StoredResource, body_len: usize) -> Headers {
        let mut headers = resource.headers.clone();
        headers.insert(CONTENT_LENGTH, body_len.to_string());
        headers
    }

    fn children(map: &BTreeMap<String, StoredResource>, uri: &ResourceUri) -> Vec<String> {
        let prefix = format!("{uri}/");
        map.range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k)
            .filter(|k| {
                let seg = &k[prefix.len()..];
                !seg.contains('/') && seg != METADATA_SEGMENT
            })
            .cloned()
            .collect()
    }

    fn with_containment(body: &Bytes, children: &[String]) -> Bytes {
        if children.is_empty() {
            return body.clone();
        }
        let Ok(Value::Object(mut doc)) = serde_json::from_slice::<Value>(body) else {
            return body.clone();
        };
        let contains: Vec<Value> = children.iter().map(|c| json!({ "@id": c })).collect();
        doc.insert(vocab::ldp::CONTAINS.as_str().to_string(), Value::Array(contains));
        match serde_json::to_vec(&Value::Object(doc)) {
            Ok(encoded) => Bytes::from(encoded),
            Err(_) => body.clone(),
        }
    }
}

impl Default for InMemoryLdpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl LdpTransport for InMemoryLdpServer {
    fn head(&self, uri: &ResourceUri) -> TransportResult<HeadResponse> {
        self.record(Method::Head, uri);
        let map = self.resources.read();
        Ok(match map.get(uri.as_str()) {
            Some(resource) => HeadResponse::new(
                Status::OK,
                Self::response_headers(resource, resource.body.len()),
            ),
            None => HeadResponse::not_found(),
        })
    }

    fn get(&self, uri: &ResourceUri) -> TransportResult<GetResponse> {
        self.record(Method::Get, uri);
        let map = self.resources.read();
        let Some(resource) = map.get(uri.as_str()) else {
            return Ok(GetResponse::not_found());
        };
        let body = if resource.headers.content_type() == Some(JSON_LD) {
            Self::with_containment(&resource.body, &Self::children(&map, uri))
        } else {
            resource.body.clone()
        };
        let headers = Self::response_headers(resource, body.len());
        Ok(GetResponse::new(Status::OK, headers, body))
    }

    fn put(&self, uri: &ResourceUri, body: Bytes, headers: &Headers) -> TransportResult<Status> {
        self.record(Method::Put, uri);
        self.check_available(Method::Put, uri)?;

        let mut map = self.resources.write();
        if uri.id() == METADATA_SEGMENT {
            let described = uri.parent().map(|p| p.to_string()).unwrap_or_default();
            if !map.contains_key(&described) {
                return Ok(Status::NOT_FOUND);
            }
        }

        let mut stored_headers = Headers::new().with(
            CONTENT_TYPE,
            headers.get(CONTENT_TYPE).unwrap_or(OCTET_STREAM),
        );
        if let Some(disposition) = headers.get(CONTENT_DISPOSITION) {
            stored_headers.insert(CONTENT_DISPOSITION, disposition);
        }
        stored_headers.insert(ETAG, format!("\"{}\"", hex::encode(blake3::hash(&body).as_bytes())));

        let previous = map.insert(
            uri.to_string(),
            StoredResource {
                body,
                headers: stored_headers,
            },
        );
        Ok(if previous.is_some() {
            Status::NO_CONTENT
        } else {
            Status::CREATED
        })
    }

    fn delete(&self, uri: &ResourceUri) -> TransportResult<Status> {
        self.record(Method::Delete, uri);
        self.check_available(Method::Delete, uri)?;

        let mut map = self.resources.write();
        if map.remove(uri.as_str()).is_none() {
            return Ok(Status::NOT_FOUND);
        }
        let prefix = format!("{uri}/");
        map.retain(|k, _| !k.starts_with(&prefix));
        Ok(Status::NO_CONTENT)
    }
}

impl std::fmt::Debug for InMemoryLdpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLdpServer")
            .field("resource_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> ResourceUri {
        ResourceUri::parse(s).unwrap()
    }

    fn put_text(server: &InMemoryLdpServer, u: &ResourceUri, body: &'static str) -> Status {
        let headers = Headers::new().with(CONTENT_TYPE, "text/plain");
        server.put(u, Bytes::from_static(body.as_bytes()), &headers).unwrap()
    }

    #[test]
    fn put_then_head_reports_length() {
        let server = InMemoryLdpServer::new();
        let u = uri("http://localhost:8983/fedora/rest/test/1234/abcd");
        assert_eq!(put_text(&server, &u, "hi there"), Status::CREATED);

        let head = server.head(&u).unwrap();
        assert_eq!(head.status, Status::OK);
        assert_eq!(head.headers.content_length(), Some(8));
        assert_eq!(head.headers.content_type(), Some("text/plain"));
        assert!(head.headers.get(ETAG).is_some());
    }

    #[test]
    fn second_put_replaces() {
        let server = InMemoryLdpServer::new();
        let u = uri("http://h/base/x");
        put_text(&server, &u, "one");
        assert_eq!(put_text(&server, &u, "three"), Status::NO_CONTENT);
        assert_eq!(server.body(&u).unwrap(), Bytes::from_static(b"three"));
        assert_eq!(server.len(), 1);
    }

    #[test]
    fn missing_resource_is_404() {
        let server = InMemoryLdpServer::new();
        let u = uri("http://h/base/missing");
        assert_eq!(server.head(&u).unwrap().status, Status::NOT_FOUND);
        assert_eq!(server.get(&u).unwrap().status, Status::NOT_FOUND);
        assert_eq!(server.delete(&u).unwrap(), Status::NOT_FOUND);
        assert!(!server.exists(&u).unwrap());
    }

    #[test]
    fn etag_tracks_content() {
        let server = InMemoryLdpServer::new();
        let a = uri("http://h/base/a");
        let b = uri("http://h/base/b");
        put_text(&server, &a, "same");
        put_text(&server, &b, "same");
        let etag_a = server.head(&a).unwrap().headers.get(ETAG).map(str::to_string);
        let etag_b = server.head(&b).unwrap().headers.get(ETAG).map(str::to_string);
        assert_eq!(etag_a, etag_b);
    }

    #[test]
    fn metadata_requires_described_binary() {
        let server = InMemoryLdpServer::new();
        let binary = uri("http://h/base/1234/abcd");
        let meta = binary.join(METADATA_SEGMENT);
        let headers = Headers::new().with(CONTENT_TYPE, JSON_LD);

        let status = server.put(&meta, Bytes::from_static(b"{}"), &headers).unwrap();
        assert_eq!(status, Status::NOT_FOUND);

        put_text(&server, &binary, "data");
        let status = server.put(&meta, Bytes::from_static(b"{}"), &headers).unwrap();
        assert_eq!(status, Status::CREATED);
    }

    #[test]
    fn container_get_lists_direct_children() {
        let server = InMemoryLdpServer::new();
        let parent = uri("http://h/base/1234");
        let headers = Headers::new().with(CONTENT_TYPE, JSON_LD);
        let doc = format!("{{\"@id\":\"{parent}\"}}");
        server.put(&parent, Bytes::from(doc), &headers).unwrap();
        put_text(&server, &parent.join("abcd"), "a");
        put_text(&server, &parent.join("efgh"), "b");
        server
            .put(&parent.join("abcd").join(METADATA_SEGMENT), Bytes::from_static(b"{}"), &headers)
            .unwrap();
        put_text(&server, &uri("http://h/base/12345"), "not a child");

        let resp = server.get(&parent).unwrap();
        let doc: Value = serde_json::from_slice(&resp.body).unwrap();
        let contains: Vec<&str> = doc[vocab::ldp::CONTAINS.as_str()]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["@id"].as_str().unwrap())
            .collect();
        assert_eq!(contains, vec!["http://h/base/1234/abcd", "http://h/base/1234/efgh"]);
        assert_eq!(resp.headers.content_length(), Some(resp.body.len() as u64));
    }

    #[test]
    fn binary_get_is_untouched() {
        let server = InMemoryLdpServer::new();
        let u = uri("http://h/base/bin");
        put_text(&server, &u, "{\"looks\":\"like json\"}");
        put_text(&server, &u.join("child"), "x");
        let resp = server.get(&u).unwrap();
        assert_eq!(resp.body, Bytes::from_static(b"{\"looks\":\"like json\"}"));
    }

    #[test]
    fn delete_cascades() {
        let server = InMemoryLdpServer::new();
        let parent = uri("http://h/base/1234");
        put_text(&server, &parent, "p");
        put_text(&server, &parent.join("abcd"), "c");
        put_text(&server, &uri("http://h/base/12345"), "sibling");

        assert_eq!(server.delete(&parent).unwrap(), Status::NO_CONTENT);
        assert_eq!(server.uris(), vec!["http://h/base/12345".to_string()]);
    }

    #[test]
    fn injected_write_failure() {
        let server = InMemoryLdpServer::new();
        let u = uri("http://h/base/x");
        server.fail_writes_to(&u);
        let err = server
            .put(&u, Bytes::from_static(b"x"), &Headers::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable { method: "PUT", .. }));
        assert!(server.is_empty());

        server.restore(&u);
        assert_eq!(put_text(&server, &u, "x"), Status::CREATED);
    }

    #[test]
    fn calls_are_recorded_in_order() {
        let server = InMemoryLdpServer::new();
        let u = uri("http://h/base/x");
        put_text(&server, &u, "x");
        server.head(&u).unwrap();
        server.delete(&u).unwrap();

        let methods: Vec<Method> = server.calls().iter().map(|c| c.method).collect();
        assert_eq!(methods, vec![Method::Put, Method::Head, Method::Delete]);
        assert_eq!(server.calls_with(Method::Head), vec!["http://h/base/x".to_string()]);

        server.clear_calls();
        assert!(server.calls().is_empty());
    }

    #[test]
    fn default_content_type_is_octet_stream() {
        let server = InMemoryLdpServer::new();
        let u = uri("http://h/base/x");
        server.put(&u, Bytes::from_static(b"x"), &Headers::new()).unwrap();
        assert_eq!(server.head(&u).unwrap().headers.content_type(), Some(OCTET_STREAM));
    }
}
