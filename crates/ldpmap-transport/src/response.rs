use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

use crate::error::{TransportError, TransportResult};

pub const CONTENT_LENGTH: &str = "content-length";
pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_DISPOSITION: &str = "content-disposition";
pub const ETAG: &str = "etag";

/// Media type of RDF sources exchanged with the repository.
pub const JSON_LD: &str = "application/ld+json";
/// Media type assumed for binaries uploaded without one.
pub const OCTET_STREAM: &str = "application/octet-stream";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// HTTP status code of a transport exchange.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(pub u16);

impl Status {
    pub const OK: Status = Status(200);
    pub const CREATED: Status = Status(201);
    pub const NO_CONTENT: Status = Status(204);
    pub const NOT_FOUND: Status = Status(404);
    pub const GONE: Status = Status(410);
    pub const INTERNAL_SERVER_ERROR: Status = Status(500);

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// 2xx.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// 404, or 410 for a deleted resource's tombstone.
    pub fn is_not_found(self) -> bool {
        self == Self::NOT_FOUND || self == Self::GONE
    }

    /// Turn a non-2xx status into [`TransportError::UnexpectedStatus`].
    pub fn ensure_success(self, method: &'static str, uri: &str) -> TransportResult<Status> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::UnexpectedStatus {
                method,
                uri: uri.to_string(),
                status: self.0,
            })
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({})", self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Case-insensitive header map. Names are stored lowercased.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.get(CONTENT_LENGTH)?.trim().parse().ok()
    }

    /// `Content-Type` without parameters (`text/plain; charset=utf-8` → `text/plain`).
    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE)
            .map(|v| v.split(';').next().unwrap_or(v).trim())
            .filter(|v| !v.is_empty())
    }

    /// The `filename` parameter of `Content-Disposition`.
    pub fn filename(&self) -> Option<String> {
        parse_disposition_filename(self.get(CONTENT_DISPOSITION)?)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k.as_ref(), v);
        }
        headers
    }
}

/// `Content-Disposition` value for an upload named `filename`.
///
/// Printable ASCII names are sent as `attachment; filename="<name>"` with
/// quotes and backslashes escaped. Any other name also gets an RFC 6266
/// `filename*=UTF-8''<percent-encoded>` parameter, and its plain `filename`
/// fallback has each non-ASCII or control character replaced by `_`, so the
/// header value is always ASCII.
pub fn attachment_disposition(filename: &str) -> String {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    if is_plain_ascii(filename) {
        return format!("attachment; filename=\"{escaped}\"");
    }
    let fallback: String = escaped
        .chars()
        .map(|c| if is_plain_ascii_char(c) { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

fn is_plain_ascii_char(c: char) -> bool {
    c.is_ascii() && !c.is_ascii_control()
}

fn is_plain_ascii(s: &str) -> bool {
    s.chars().all(is_plain_ascii_char)
}

// `filename*` wins over `filename` when both are present and decodable.
fn parse_disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    for param in split_params(value) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let raw = raw.trim();
        if key.eq_ignore_ascii_case("filename*") {
            if let Some(name) = decode_ext_value(raw) {
                return Some(name);
            }
        } else if key.eq_ignore_ascii_case("filename") && plain.is_none() {
            plain = Some(match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
                Some(quoted) => unescape_quoted(quoted),
                None => raw.to_string(),
            });
        }
    }
    plain
}

// RFC 8187 ext-value: `charset'[language]'pct-encoded`.
fn decode_ext_value(raw: &str) -> Option<String> {
    let (charset, rest) = raw.split_once('\'')?;
    let (_language, encoded) = rest.split_once('\'')?;
    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    if charset.eq_ignore_ascii_case("UTF-8") {
        String::from_utf8(bytes.into_owned()).ok()
    } else if charset.eq_ignore_ascii_case("ISO-8859-1") {
        Some(bytes.iter().map(|&b| char::from(b)).collect())
    } else {
        None
    }
}

// Splits on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in value.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Result of a HEAD: status and headers, never a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadResponse {
    pub status: Status,
    pub headers: Headers,
}

impl HeadResponse {
    pub fn new(status: Status, headers: Headers) -> Self {
        Self { status, headers }
    }

    pub fn not_found() -> Self {
        Self::new(Status::NOT_FOUND, Headers::new())
    }
}

/// Result of a GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetResponse {
    pub status: Status,
    pub headers: Headers,
    pub body: Bytes,
}

impl GetResponse {
    pub fn new(status: Status, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(Status::NOT_FOUND, Headers::new(), Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let h = Headers::new().with("Content-Length", "9999");
        assert_eq!(h.get("content-length"), Some("9999"));
        assert_eq!(h.get("CONTENT-LENGTH"), Some("9999"));
        assert_eq!(h.content_length(), Some(9999));
    }

    #[test]
    fn content_length_absent_or_garbage() {
        assert_eq!(Headers::new().content_length(), None);
        assert_eq!(Headers::new().with("Content-Length", "lots").content_length(), None);
        assert_eq!(Headers::new().with("Content-Length", "0").content_length(), Some(0));
    }

    #[test]
    fn content_type_drops_parameters() {
        let h = Headers::new().with("Content-Type", "text/plain; charset=utf-8");
        assert_eq!(h.content_type(), Some("text/plain"));
    }

    #[test]
    fn disposition_roundtrip() {
        let h = Headers::new().with(CONTENT_DISPOSITION, attachment_disposition("my_image.png"));
        assert_eq!(h.get(CONTENT_DISPOSITION), Some("attachment; filename=\"my_image.png\""));
        assert_eq!(h.filename().as_deref(), Some("my_image.png"));
    }

    #[test]
    fn disposition_with_quotes_and_semicolons() {
        let name = "a \"quoted\"; name.txt";
        let h = Headers::new().with(CONTENT_DISPOSITION, attachment_disposition(name));
        assert_eq!(h.filename().as_deref(), Some(name));
    }

    #[test]
    fn disposition_non_ascii_name_is_extended() {
        let value = attachment_disposition("caf\u{e9}.png");
        assert!(value.is_ascii());
        assert_eq!(
            value,
            "attachment; filename=\"caf_.png\"; filename*=UTF-8''caf%C3%A9.png"
        );
        let h = Headers::new().with(CONTENT_DISPOSITION, value);
        assert_eq!(h.filename().as_deref(), Some("caf\u{e9}.png"));
    }

    #[test]
    fn disposition_extended_name_with_quotes() {
        let name = "\u{65e5}\u{672c} \"q\"; it's.txt";
        let h = Headers::new().with(CONTENT_DISPOSITION, attachment_disposition(name));
        assert_eq!(h.filename().as_deref(), Some(name));
    }

    #[test]
    fn disposition_prefers_extended_parameter() {
        let h = Headers::new().with(
            CONTENT_DISPOSITION,
            "attachment; filename*=UTF-8''%E2%82%AC%20rates.txt; filename=\"EUR rates.txt\"",
        );
        assert_eq!(h.filename().as_deref(), Some("\u{20ac} rates.txt"));
        let h = Headers::new().with(CONTENT_DISPOSITION, "attachment; filename*=iso-8859-1'en'%A3.txt");
        assert_eq!(h.filename().as_deref(), Some("\u{a3}.txt"));
    }

    #[test]
    fn disposition_undecodable_extension_falls_back() {
        let h = Headers::new().with(
            CONTENT_DISPOSITION,
            "attachment; filename=\"plain.txt\"; filename*=KOI8-R''%C1",
        );
        assert_eq!(h.filename().as_deref(), Some("plain.txt"));
    }

    #[test]
    fn disposition_unquoted_and_missing() {
        let h = Headers::new().with(CONTENT_DISPOSITION, "inline; filename=x.pdf; size=3");
        assert_eq!(h.filename().as_deref(), Some("x.pdf"));
        let h = Headers::new().with(CONTENT_DISPOSITION, "inline");
        assert_eq!(h.filename(), None);
    }

    #[test]
    fn status_classes() {
        assert!(Status::CREATED.is_success());
        assert!(!Status::NOT_FOUND.is_success());
        assert!(Status::GONE.is_not_found());
        assert!(Status::OK.ensure_success("PUT", "http://h/x").is_ok());
        let err = Status::INTERNAL_SERVER_ERROR.ensure_success("PUT", "http://h/x").unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedStatus { status: 500, .. }));
    }
}
