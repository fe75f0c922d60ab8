//! Capabilities a parent object offers to its files.
//!
//! Files never own their parent. They hold a `Weak<dyn FileParent>` and ask
//! it for the URI to build on and the sibling ids to allocate against. The
//! files collection needs a little more: which keys are declared by the
//! parent's model and how to resolve a key to its file.

use ldpmap_types::ResourceUri;

/// What a file needs from the object it is attached to.
pub trait FileParent: Send + Sync {
    /// URI of the parent, once it has one.
    fn uri(&self) -> Option<ResourceUri>;

    /// The parent's id, the last segment of its URI.
    fn id(&self) -> Option<String> {
        self.uri().map(|u| u.id().to_string())
    }

    /// `true` until the parent's first successful save.
    fn is_new_record(&self) -> bool;

    /// Keys (dsids) of every file currently attached, declared or not.
    fn attached_file_keys(&self) -> Vec<String>;
}

/// What [`FilesHash`](crate::FilesHash) needs from a parent.
pub trait FileContainer {
    /// The value an association resolves to.
    type Target: Clone;

    /// Keys declared by the parent's model, in declaration order.
    fn declared_file_keys(&self) -> Vec<String>;

    /// Attached keys the model does not declare.
    fn undeclared_file_keys(&self) -> Vec<String>;

    /// Resolve the association for `key`. `None` if there is none.
    fn resolve_file(&self, key: &str) -> Option<Self::Target>;
}
