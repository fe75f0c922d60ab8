//! Scripted transport for unit tests.
//!
//! Responses are registered per method and URI path, the way an HTTP test
//! adapter is stubbed, so a test can answer a HEAD with exactly the headers
//! it wants to exercise (including none at all).

use std::collections::HashMap;

use bytes::Bytes;
use ldpmap_types::ResourceUri;
use parking_lot::RwLock;

use crate::error::{TransportError, TransportResult};
use crate::response::{GetResponse, HeadResponse, Headers, Status};
use crate::traits::{LdpTransport, Method, RecordedCall};

#[derive(Clone, Debug)]
enum Stubbed {
    Head(HeadResponse),
    Get(GetResponse),
    Status(Status),
}

/// Transport that answers only what was stubbed.
///
/// Requests are matched on method and the URI's path, so stubs do not
/// depend on the configured host. Unmatched requests fail with
/// [`TransportError::NoStub`].
#[derive(Debug, Default)]
pub struct StubTransport {
    stubs: HashMap<(Method, String), Stubbed>,
    calls: RwLock<Vec<RecordedCall>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `HEAD path` with `status` and `headers`.
    pub fn on_head<I, K, V>(mut self, path: &str, status: u16, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let response = HeadResponse::new(Status(status), headers.into_iter().collect());
        self.stubs
            .insert((Method::Head, path.to_string()), Stubbed::Head(response));
        self
    }

    /// Answer `GET path` with `status`, `headers` and `body`.
    pub fn on_get<I, K, V>(
        mut self,
        path: &str,
        status: u16,
        headers: I,
        body: impl Into<Bytes>,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let response = GetResponse::new(Status(status), headers.into_iter().collect(), body);
        self.stubs
            .insert((Method::Get, path.to_string()), Stubbed::Get(response));
        self
    }

    /// Answer `PUT path` with `status`.
    pub fn on_put(mut self, path: &str, status: u16) -> Self {
        self.stubs
            .insert((Method::Put, path.to_string()), Stubbed::Status(Status(status)));
        self
    }

    /// Answer `DELETE path` with `status`.
    pub fn on_delete(mut self, path: &str, status: u16) -> Self {
        self.stubs.insert(
            (Method::Delete, path.to_string()),
            Stubbed::Status(Status(status)),
        );
        self
    }

    /// All requests received, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().clone()
    }

    fn lookup(&self, method: Method, uri: &ResourceUri) -> TransportResult<Stubbed> {
        self.calls.write().push(RecordedCall::new(method, uri));
        self.stubs
            .get(&(method, uri.path().to_string()))
            .cloned()
            .ok_or_else(|| TransportError::NoStub {
                method: method.as_str(),
                path: uri.path().to_string(),
            })
    }
}

impl LdpTransport for StubTransport {
    fn head(&self, uri: &ResourceUri) -> TransportResult<HeadResponse> {
        match self.lookup(Method::Head, uri)? {
            Stubbed::Head(response) => Ok(response),
            Stubbed::Get(response) => Ok(HeadResponse::new(response.status, response.headers)),
            Stubbed::Status(status) => Ok(HeadResponse::new(status, Headers::new())),
        }
    }

    fn get(&self, uri: &ResourceUri) -> TransportResult<GetResponse> {
        match self.lookup(Method::Get, uri)? {
            Stubbed::Get(response) => Ok(response),
            Stubbed::Head(response) => Ok(GetResponse::new(
                response.status,
                response.headers,
                Bytes::new(),
            )),
            Stubbed::Status(status) => Ok(GetResponse::new(status, Headers::new(), Bytes::new())),
        }
    }

    fn put(&self, uri: &ResourceUri, _body: Bytes, _headers: &Headers) -> TransportResult<Status> {
        match self.lookup(Method::Put, uri)? {
            Stubbed::Status(status) => Ok(status),
            Stubbed::Head(response) => Ok(response.status),
            Stubbed::Get(response) => Ok(response.status),
        }
    }

    fn delete(&self, uri: &ResourceUri) -> TransportResult<Status> {
        match self.lookup(Method::Delete, uri)? {
            Stubbed::Status(status) => Ok(status),
            Stubbed::Head(response) => Ok(response.status),
            Stubbed::Get(response) => Ok(response.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> ResourceUri {
        ResourceUri::parse(s).unwrap()
    }

    #[test]
    fn head_matches_on_path() {
        let stub = StubTransport::new().on_head(
            "/fedora/rest/test/1234/abcd",
            200,
            [("Content-Length", "9999")],
        );
        let resp = stub
            .head(&uri("http://localhost:8983/fedora/rest/test/1234/abcd"))
            .unwrap();
        assert_eq!(resp.status, Status::OK);
        assert_eq!(resp.headers.content_length(), Some(9999));
    }

    #[test]
    fn head_without_headers() {
        let stub = StubTransport::new().on_head("/x", 200, Vec::<(&str, &str)>::new());
        let resp = stub.head(&uri("http://h/x")).unwrap();
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn unstubbed_request_fails() {
        let stub = StubTransport::new();
        let err = stub.head(&uri("http://h/nothing")).unwrap_err();
        assert!(matches!(err, TransportError::NoStub { method: "HEAD", .. }));
        assert_eq!(stub.calls().len(), 1);
    }

    #[test]
    fn put_and_delete_statuses() {
        let stub = StubTransport::new().on_put("/x", 500).on_delete("/x", 204);
        let u = uri("http://h/x");
        assert_eq!(stub.put(&u, Bytes::new(), &Headers::new()).unwrap(), Status(500));
        assert_eq!(stub.delete(&u).unwrap(), Status::NO_CONTENT);
    }

    #[test]
    fn get_returns_body() {
        let stub = StubTransport::new().on_get(
            "/x",
            200,
            [("Content-Type", "text/plain")],
            "hello",
        );
        let resp = stub.get(&uri("http://h/x")).unwrap();
        assert_eq!(resp.body, Bytes::from_static(b"hello"));
        assert_eq!(resp.headers.content_type(), Some("text/plain"));
    }
}
