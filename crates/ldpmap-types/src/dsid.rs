use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Prefix used when a file is attached without an explicit dsid.
pub const DEFAULT_DSID_PREFIX: &str = "DS";

/// Datastream id: the name of a file resource below its parent object.
///
/// A dsid is the last path segment of the file's URI, so it must be
/// non-empty and must not contain `/`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dsid(String);

impl Dsid {
    /// Validate and wrap a dsid.
    pub fn new(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        if s.is_empty() {
            return Err(TypeError::EmptyDsid);
        }
        if s.contains('/') {
            return Err(TypeError::InvalidDsid {
                dsid: s,
                reason: "must not contain '/'".into(),
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidDsid {
                dsid: s,
                reason: "must not contain whitespace".into(),
            });
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL-segment form of the dsid.
    ///
    /// Every `.` becomes `%2e` so routers do not mistake the tail for a
    /// format extension. No other character is touched, and an id that is
    /// already encoded is left alone because it contains no literal dot.
    ///
    /// ```
    /// use ldpmap_types::Dsid;
    ///
    /// assert_eq!(Dsid::new("foo.bar").unwrap().to_param(), "foo%2ebar");
    /// assert_eq!(Dsid::new("foo%2ebar").unwrap().to_param(), "foo%2ebar");
    /// ```
    pub fn to_param(&self) -> String {
        self.0.replace('.', "%2e")
    }

    /// The numeric suffix of this dsid under `prefix`, if it has one.
    ///
    /// `FOO56` under `FOO` is `Some(56)`; `FOObar`, `FOO` and `BAR2` are `None`.
    pub fn numeric_suffix(&self, prefix: &str) -> Option<u128> {
        numeric_suffix(&self.0, prefix)
    }
}

/// Check that `prefix` can start a dsid: it must not contain `/` or
/// whitespace. An empty prefix is allowed and yields purely numeric ids.
pub fn validate_prefix(prefix: &str) -> Result<(), TypeError> {
    let reason = if prefix.contains('/') {
        "must not contain '/'"
    } else if prefix.chars().any(char::is_whitespace) {
        "must not contain whitespace"
    } else {
        return Ok(());
    };
    Err(TypeError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: reason.into(),
    })
}

fn numeric_suffix(id: &str, prefix: &str) -> Option<u128> {
    let digits = id.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Allocate the next dsid under `prefix`.
///
/// Scans `existing` for ids of the form `prefix<digits>`, takes the largest
/// suffix (0 when nothing matches) and returns `prefix<max + 1>`. Ids under
/// other prefixes or with non-numeric tails are ignored, so allocation never
/// fails. Gaps are not reused, except when the largest suffix is already
/// `u128::MAX`; then the lowest unused suffix is taken instead.
///
/// `prefix` is expected to pass [`validate_prefix`].
///
/// Allocation is not atomic: two allocators reading the same sibling set
/// get the same answer. Callers serialize allocation per parent.
///
/// ```
/// use ldpmap_types::next_dsid;
///
/// assert_eq!(next_dsid("P", ["P1", "P5", "Q2"]).as_str(), "P6");
/// assert_eq!(next_dsid("P", Vec::<&str>::new()).as_str(), "P1");
/// ```
pub fn next_dsid<I, S>(prefix: &str, existing: I) -> Dsid
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let taken: BTreeSet<u128> = existing
        .into_iter()
        .filter_map(|id| numeric_suffix(id.as_ref(), prefix))
        .collect();
    let max = taken.last().copied().unwrap_or(0);
    let next = match max.checked_add(1) {
        Some(next) => next,
        None => (1u128..).find(|n| !taken.contains(n)).unwrap_or(0),
    };
    Dsid(format!("{prefix}{next}"))
}

impl fmt::Debug for Dsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dsid({})", self.0)
    }
}

impl fmt::Display for Dsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Dsid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Dsid {
    type Error = TypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Dsid> for String {
    fn from(dsid: Dsid) -> Self {
        dsid.0
    }
}

impl AsRef<str> for Dsid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_set_starts_at_one() {
        assert_eq!(next_dsid("FOO", Vec::<String>::new()).as_str(), "FOO1");
    }

    #[test]
    fn continues_from_highest() {
        assert_eq!(next_dsid("FOO", ["FOO56"]).as_str(), "FOO57");
        assert_eq!(next_dsid("P", ["P1", "P5", "Q2"]).as_str(), "P6");
    }

    #[test]
    fn ignores_non_matching_siblings() {
        let existing = ["descMetadata", "FOObar", "FOO", "BAR9", "FOO-3", "FOO2x"];
        assert_eq!(next_dsid("FOO", existing).as_str(), "FOO1");
    }

    #[test]
    fn prefix_is_case_sensitive() {
        assert_eq!(next_dsid("ds", ["DS4"]).as_str(), "ds1");
    }

    #[test]
    fn leading_zeros_parse_numerically() {
        assert_eq!(next_dsid("DS", ["DS007", "DS3"]).as_str(), "DS8");
    }

    #[test]
    fn suffix_past_u64_keeps_counting() {
        let existing = ["DS18446744073709551615"];
        let next = next_dsid("DS", existing);
        assert_eq!(next.as_str(), "DS18446744073709551616");
        assert!(!existing.contains(&next.as_str()));
        assert_eq!(next_dsid("DS", ["DS18446744073709551616", "DS2"]).as_str(), "DS18446744073709551617");
    }

    #[test]
    fn saturated_suffix_falls_back_to_lowest_free() {
        let max = format!("DS{}", u128::MAX);
        assert_eq!(next_dsid("DS", [max.as_str(), "DS1", "DS3"]).as_str(), "DS2");
        assert_ne!(next_dsid("DS", [max.as_str()]).as_str(), max);
    }

    #[test]
    fn overflowing_suffix_is_ignored() {
        let huge = format!("DS{}0", u128::MAX);
        assert_eq!(next_dsid("DS", [huge.as_str(), "DS2"]).as_str(), "DS3");
    }

    #[test]
    fn prefix_validation() {
        assert!(validate_prefix("FOO").is_ok());
        assert!(validate_prefix("").is_ok());
        assert!(matches!(validate_prefix("a/b"), Err(TypeError::InvalidPrefix { .. })));
        assert!(matches!(validate_prefix("a b"), Err(TypeError::InvalidPrefix { .. })));
    }

    #[test]
    fn to_param_escapes_only_dots() {
        assert_eq!(Dsid::new("foo.bar").unwrap().to_param(), "foo%2ebar");
        assert_eq!(Dsid::new("a.b.c").unwrap().to_param(), "a%2eb%2ec");
        assert_eq!(Dsid::new("plain-id_1").unwrap().to_param(), "plain-id_1");
    }

    #[test]
    fn to_param_does_not_double_escape() {
        let once = Dsid::new("foo.bar").unwrap().to_param();
        let twice = Dsid::new(once.clone()).unwrap().to_param();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_invalid_dsids() {
        assert_eq!(Dsid::new(""), Err(TypeError::EmptyDsid));
        assert!(Dsid::new("a/b").is_err());
        assert!(Dsid::new("a b").is_err());
    }

    #[test]
    fn numeric_suffix_by_prefix() {
        let dsid = Dsid::new("FOO56").unwrap();
        assert_eq!(dsid.numeric_suffix("FOO"), Some(56));
        assert_eq!(dsid.numeric_suffix("BAR"), None);
        assert_eq!(Dsid::new("FOO").unwrap().numeric_suffix("FOO"), None);
    }

    proptest! {
        #[test]
        fn allocation_is_max_plus_one(suffixes in proptest::collection::vec(0u64..100_000, 0..20)) {
            let existing: Vec<String> = suffixes.iter().map(|n| format!("P{n}")).collect();
            let expected = suffixes.iter().copied().max().unwrap_or(0) + 1;
            let next = next_dsid("P", &existing);
            prop_assert_eq!(next.as_str(), format!("P{expected}"));
        }

        #[test]
        fn allocated_dsid_is_fresh(ids in proptest::collection::vec("[A-Z]{1,3}[0-9]{0,4}", 0..20)) {
            let next = next_dsid("DS", &ids);
            prop_assert!(!ids.iter().any(|id| id == next.as_str()));
        }

        #[test]
        fn allocated_dsid_is_fresh_near_overflow(offsets in proptest::collection::vec(0u128..4, 1..4)) {
            let ids: Vec<String> = offsets.iter().map(|o| format!("DS{}", u128::MAX - o)).collect();
            let next = next_dsid("DS", &ids);
            prop_assert!(!ids.iter().any(|id| id == next.as_str()));
        }

        #[test]
        fn to_param_is_identity_without_dots(s in "[A-Za-z0-9_:%-]{1,24}") {
            prop_assert_eq!(Dsid::new(s.clone()).unwrap().to_param(), s);
        }

        #[test]
        fn to_param_leaves_no_literal_dot(s in "[A-Za-z0-9.]{1,24}") {
            let param = Dsid::new(s.clone()).unwrap().to_param();
            prop_assert!(!param.contains('.'));
            prop_assert_eq!(param.replace("%2e", "."), s);
        }
    }
}
