use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Absolute URI of a resource in the repository.
///
/// A `ResourceUri` is always stored without a trailing slash, so joining a
/// child segment and taking the last segment back are exact inverses. The
/// final path segment is the resource's id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceUri(String);

impl ResourceUri {
    /// Parse an absolute URI such as `http://localhost:8983/fedora/rest/1234`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim().trim_end_matches('/');
        let Some(scheme_end) = trimmed.find("://") else {
            return Err(TypeError::InvalidUri {
                uri: s.to_string(),
                reason: "missing scheme".into(),
            });
        };
        if scheme_end == 0 {
            return Err(TypeError::InvalidUri {
                uri: s.to_string(),
                reason: "empty scheme".into(),
            });
        }
        let authority = &trimmed[scheme_end + 3..];
        if authority.is_empty() || authority.starts_with('/') {
            return Err(TypeError::InvalidUri {
                uri: s.to_string(),
                reason: "missing host".into(),
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidUri {
                uri: s.to_string(),
                reason: "contains whitespace".into(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build the repository base URI from a host and a base path.
    ///
    /// ```
    /// use ldpmap_types::ResourceUri;
    ///
    /// let base = ResourceUri::from_parts("http://localhost:8983/", "/fedora/rest/test").unwrap();
    /// assert_eq!(base.as_str(), "http://localhost:8983/fedora/rest/test");
    /// ```
    pub fn from_parts(host: &str, base_path: &str) -> Result<Self, TypeError> {
        let path = base_path.trim_matches('/');
        if path.is_empty() {
            Self::parse(host)
        } else {
            Self::parse(&format!("{}/{}", host.trim_end_matches('/'), path))
        }
    }

    /// The URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URI of a child resource one segment below this one.
    pub fn join(&self, segment: &str) -> ResourceUri {
        Self(format!("{}/{}", self.0, segment.trim_matches('/')))
    }

    /// Path component, e.g. `/fedora/rest/test/1234` (empty for a bare host).
    pub fn path(&self) -> &str {
        let rest = self.after_scheme();
        match rest.find('/') {
            Some(pos) => &rest[pos..],
            None => "",
        }
    }

    /// The final path segment, which is the resource's id.
    pub fn id(&self) -> &str {
        let path = self.path();
        path.rsplit('/').next().unwrap_or_default()
    }

    /// URI of the enclosing resource, or `None` at the host root.
    pub fn parent(&self) -> Option<ResourceUri> {
        let path = self.path();
        if path.is_empty() {
            return None;
        }
        let cut = self.0.len() - path.len() + path.rfind('/')?;
        Some(Self(self.0[..cut].to_string()))
    }

    /// Returns `true` if `other` sits exactly one segment below `self`.
    pub fn is_direct_child(&self, other: &ResourceUri) -> bool {
        other
            .0
            .strip_prefix(&self.0)
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|seg| !seg.is_empty() && !seg.contains('/'))
    }

    fn after_scheme(&self) -> &str {
        match self.0.find("://") {
            Some(pos) => &self.0[pos + 3..],
            None => &self.0,
        }
    }
}

impl fmt::Debug for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceUri({})", self.0)
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceUri {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceUri {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ResourceUri> for String {
    fn from(uri: ResourceUri) -> Self {
        uri.0
    }
}

impl AsRef<str> for ResourceUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> ResourceUri {
        ResourceUri::parse(s).unwrap()
    }

    #[test]
    fn parse_strips_trailing_slash() {
        assert_eq!(uri("http://localhost:8983/fedora/").as_str(), "http://localhost:8983/fedora");
    }

    #[test]
    fn parse_rejects_relative() {
        assert!(ResourceUri::parse("/fedora/rest").is_err());
        assert!(ResourceUri::parse("://host").is_err());
        assert!(ResourceUri::parse("http://").is_err());
        assert!(ResourceUri::parse("http://host/a b").is_err());
    }

    #[test]
    fn from_parts_normalizes_slashes() {
        let base = ResourceUri::from_parts("http://localhost:8983", "fedora/rest/test/").unwrap();
        assert_eq!(base.as_str(), "http://localhost:8983/fedora/rest/test");

        let bare = ResourceUri::from_parts("http://localhost:8983/", "").unwrap();
        assert_eq!(bare.as_str(), "http://localhost:8983");
    }

    #[test]
    fn join_and_id_are_inverse() {
        let parent = uri("http://localhost:8983/fedora/rest/test/1234");
        let child = parent.join("abcd");
        assert_eq!(child.as_str(), "http://localhost:8983/fedora/rest/test/1234/abcd");
        assert_eq!(child.id(), "abcd");
        assert_eq!(child.parent(), Some(parent));
    }

    #[test]
    fn path_of_resource() {
        let u = uri("http://localhost:8983/fedora/rest/test/1234/abcd");
        assert_eq!(u.path(), "/fedora/rest/test/1234/abcd");
        assert_eq!(uri("http://localhost:8983").path(), "");
        assert_eq!(uri("http://localhost:8983").id(), "");
        assert_eq!(uri("http://localhost:8983").parent(), None);
    }

    #[test]
    fn direct_child_detection() {
        let parent = uri("http://h/base/1234");
        assert!(parent.is_direct_child(&uri("http://h/base/1234/abcd")));
        assert!(!parent.is_direct_child(&uri("http://h/base/1234/abcd/fcr:metadata")));
        assert!(!parent.is_direct_child(&uri("http://h/base/12345")));
        assert!(!parent.is_direct_child(&parent));
    }

    #[test]
    fn serde_roundtrip() {
        let u = uri("http://localhost:8983/fedora/rest/test/1234");
        let json = serde_json::to_string(&u).unwrap();
        assert_eq!(json, "\"http://localhost:8983/fedora/rest/test/1234\"");
        let parsed: ResourceUri = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, u);
    }

    #[test]
    fn serde_rejects_invalid() {
        assert!(serde_json::from_str::<ResourceUri>("\"not a uri\"").is_err());
    }
}
