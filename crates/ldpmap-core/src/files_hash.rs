//! Read-only, lazily resolved view of a parent's files keyed by dsid.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::parent::FileContainer;

/// Map-like view over a container's file associations.
///
/// Keys are the declared files followed by any undeclared ones. Each
/// association is resolved at most once per view, on first lookup.
pub struct FilesHash<'a, C: FileContainer + ?Sized> {
    container: &'a C,
    cache: RefCell<BTreeMap<String, Option<C::Target>>>,
}

impl<'a, C: FileContainer + ?Sized> FilesHash<'a, C> {
    pub fn new(container: &'a C) -> Self {
        Self {
            container,
            cache: RefCell::new(BTreeMap::new()),
        }
    }

    /// Declared keys in declaration order, then undeclared keys. No key
    /// appears twice.
    pub fn keys(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.container
            .declared_file_keys()
            .into_iter()
            .chain(self.container.undeclared_file_keys())
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    pub fn contains_key(&self, key: impl AsRef<str>) -> bool {
        let key = key.as_ref();
        self.keys().iter().any(|k| k == key)
    }

    /// The file for `key`, or `None` for unknown keys.
    pub fn get(&self, key: impl AsRef<str>) -> Option<C::Target> {
        let key = key.as_ref();
        if let Some(cached) = self.cache.borrow().get(key) {
            return cached.clone();
        }
        if !self.contains_key(key) {
            return None;
        }
        let resolved = self.container.resolve_file(key);
        self.cache
            .borrow_mut()
            .insert(key.to_string(), resolved.clone());
        resolved
    }

    /// `(key, file)` pairs in key order, resolving as needed.
    pub fn entries(&self) -> Vec<(String, C::Target)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|file| (key, file)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: FileContainer + ?Sized> std::fmt::Debug for FilesHash<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesHash").field("keys", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct MockContainer {
        declared: Vec<&'static str>,
        undeclared: Vec<&'static str>,
        resolves: Cell<usize>,
    }

    impl MockContainer {
        fn new(declared: &[&'static str], undeclared: &[&'static str]) -> Self {
            Self {
                declared: declared.to_vec(),
                undeclared: undeclared.to_vec(),
                resolves: Cell::new(0),
            }
        }
    }

    impl FileContainer for MockContainer {
        type Target = String;

        fn declared_file_keys(&self) -> Vec<String> {
            self.declared.iter().map(|s| s.to_string()).collect()
        }

        fn undeclared_file_keys(&self) -> Vec<String> {
            self.undeclared.iter().map(|s| s.to_string()).collect()
        }

        fn resolve_file(&self, key: &str) -> Option<String> {
            self.resolves.set(self.resolves.get() + 1);
            // "ghost" is listed but has no association behind it
            (key != "ghost").then(|| format!("file:{key}"))
        }
    }

    #[test]
    fn declared_keys_come_first() {
        let c = MockContainer::new(&["thumbnail", "content"], &["DS1"]);
        let files = FilesHash::new(&c);
        assert_eq!(files.keys(), ["thumbnail", "content", "DS1"]);
        assert_eq!(files.len(), 3);
        assert!(!files.is_empty());
    }

    #[test]
    fn duplicate_keys_are_listed_once() {
        let c = MockContainer::new(&["content"], &["content", "DS1"]);
        assert_eq!(FilesHash::new(&c).keys(), ["content", "DS1"]);
    }

    #[test]
    fn get_accepts_str_and_string() {
        let c = MockContainer::new(&["content"], &[]);
        let files = FilesHash::new(&c);
        assert_eq!(files.get("content"), Some("file:content".to_string()));
        assert_eq!(files.get(String::from("content")), Some("file:content".to_string()));
        assert!(files.contains_key("content"));
        assert!(files.contains_key(String::from("content")));
    }

    #[test]
    fn association_is_resolved_once() {
        let c = MockContainer::new(&["content"], &[]);
        let files = FilesHash::new(&c);
        files.get("content");
        files.get("content");
        files.get(String::from("content"));
        assert_eq!(c.resolves.get(), 1);
    }

    #[test]
    fn unknown_key_is_none_without_resolving() {
        let c = MockContainer::new(&["content"], &[]);
        let files = FilesHash::new(&c);
        assert_eq!(files.get("nope"), None);
        assert!(!files.contains_key("nope"));
        assert_eq!(c.resolves.get(), 0);
    }

    #[test]
    fn missing_association_is_cached_too() {
        let c = MockContainer::new(&["ghost"], &[]);
        let files = FilesHash::new(&c);
        assert_eq!(files.get("ghost"), None);
        assert_eq!(files.get("ghost"), None);
        assert_eq!(c.resolves.get(), 1);
    }

    #[test]
    fn entries_skip_unresolved() {
        let c = MockContainer::new(&["ghost", "content"], &["DS1"]);
        let entries = FilesHash::new(&c).entries();
        assert_eq!(
            entries,
            vec![
                ("content".to_string(), "file:content".to_string()),
                ("DS1".to_string(), "file:DS1".to_string()),
            ]
        );
    }

    #[test]
    fn empty_container() {
        let c = MockContainer::new(&[], &[]);
        assert!(FilesHash::new(&c).is_empty());
    }
}
