use std::time::Duration;

use bytes::Bytes;
use ldpmap_types::ResourceUri;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use crate::response::{GetResponse, HeadResponse, Headers, Status};
use crate::traits::{LdpTransport, Method};

/// Blocking HTTP transport for a live repository.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap a preconfigured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn send(
        &self,
        method: Method,
        uri: &ResourceUri,
        request: RequestBuilder,
    ) -> TransportResult<Response> {
        debug!(method = %method, uri = %uri, "ldp request");
        let response = request.send().map_err(|source| TransportError::Http {
            method: method.as_str(),
            uri: uri.to_string(),
            source,
        })?;
        debug!(method = %method, uri = %uri, status = response.status().as_u16(), "ldp response");
        Ok(response)
    }
}

fn collect_headers(response: &Response) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in response.headers() {
        match value.to_str() {
            Ok(v) => headers.insert(name.as_str(), v),
            Err(_) => warn!(header = %name, "skipping non-ascii response header"),
        }
    }
    headers
}

// Header values must be visible ASCII; anything else is rejected before
// the request is sent.
fn encode_header(name: &str, value: &str) -> TransportResult<(HeaderName, HeaderValue)> {
    let invalid = |reason: String| TransportError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    if !value.is_ascii() {
        return Err(invalid("value is not ASCII".into()));
    }
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    Ok((header_name, header_value))
}

impl LdpTransport for HttpTransport {
    fn head(&self, uri: &ResourceUri) -> TransportResult<HeadResponse> {
        let response = self.send(Method::Head, uri, self.client.head(uri.as_str()))?;
        Ok(HeadResponse::new(
            Status(response.status().as_u16()),
            collect_headers(&response),
        ))
    }

    fn get(&self, uri: &ResourceUri) -> TransportResult<GetResponse> {
        let response = self.send(Method::Get, uri, self.client.get(uri.as_str()))?;
        let status = Status(response.status().as_u16());
        let headers = collect_headers(&response);
        let body = response.bytes().map_err(|source| TransportError::Http {
            method: "GET",
            uri: uri.to_string(),
            source,
        })?;
        Ok(GetResponse::new(status, headers, body))
    }

    fn put(&self, uri: &ResourceUri, body: Bytes, headers: &Headers) -> TransportResult<Status> {
        let mut request = self.client.put(uri.as_str()).body(body.to_vec());
        for (name, value) in headers.iter() {
            let (name, value) = encode_header(name, value)?;
            request = request.header(name, value);
        }
        let response = self.send(Method::Put, uri, request)?;
        Ok(Status(response.status().as_u16()))
    }

    fn delete(&self, uri: &ResourceUri) -> TransportResult<Status> {
        let response = self.send(Method::Delete, uri, self.client.delete(uri.as_str()))?;
        Ok(Status(response.status().as_u16()))
    }
}
