//! Binary file resources ("datastreams") attached to repository objects.
//!
//! A [`File`] is either a child of a parent object, addressed as
//! `<parent uri>/<dsid>`, or standalone, addressed by its own URI. Saving
//! writes the content first and only then the file's metadata, so metadata
//! never exists remotely without the binary it describes.

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use ldpmap_transport::{
    attachment_disposition, Headers, CONTENT_DISPOSITION, CONTENT_TYPE, OCTET_STREAM,
};
use ldpmap_types::{next_dsid, validate_prefix, Dsid, ResourceUri, DEFAULT_DSID_PREFIX};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::content::ContentSource;
use crate::error::{CoreError, CoreResult};
use crate::metadata::{MetadataNode, MetadataSchema};
use crate::parent::FileParent;
use crate::repository::Repository;
use crate::save::{SaveOutcome, SkipReason};

/// Shared, lockable file as held by a parent object.
pub type FileHandle = Arc<RwLock<File>>;

/// A kind of file: its display name and the metadata it declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileType {
    name: String,
    metadata: Option<Arc<MetadataSchema>>,
}

impl FileType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
        }
    }

    /// Give files of this type a metadata node with these properties.
    pub fn with_metadata(mut self, schema: MetadataSchema) -> Self {
        self.metadata = Some(Arc::new(schema));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata_schema(&self) -> Option<&Arc<MetadataSchema>> {
        self.metadata.as_ref()
    }
}

impl Default for FileType {
    fn default() -> Self {
        Self::new("File")
    }
}

/// Options for creating a child file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileOptions {
    /// Explicit dsid. When absent one is allocated under `prefix`.
    pub dsid: Option<String>,
    /// Allocation prefix, `DS` by default.
    pub prefix: Option<String>,
    pub mime_type: Option<String>,
    pub original_name: Option<String>,
}

impl FileOptions {
    pub fn dsid(dsid: impl Into<String>) -> Self {
        Self {
            dsid: Some(dsid.into()),
            ..Self::default()
        }
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }
}

enum Identity {
    Child {
        parent: Weak<dyn FileParent>,
        prefix: String,
    },
    Standalone {
        uri: Option<ResourceUri>,
    },
}

pub struct File {
    repo: Repository,
    file_type: Arc<FileType>,
    identity: Identity,
    dsid: OnceCell<Dsid>,
    content: Option<ContentSource>,
    content_changed: bool,
    original_name: Option<String>,
    mime_type: Option<String>,
    new_record: bool,
    remote_size: OnceCell<Option<u64>>,
    metadata: Option<MetadataNode>,
}

impl File {
    /// A new standalone file. It receives a fresh URI below the repository
    /// base on its first save.
    pub fn new(repo: &Repository, file_type: Arc<FileType>) -> Self {
        Self::build(repo, file_type, Identity::Standalone { uri: None })
    }

    /// A new file attached to `parent`.
    ///
    /// The dsid is taken from `options` or allocated lazily on first use.
    pub fn child(
        repo: &Repository,
        file_type: Arc<FileType>,
        parent: Weak<dyn FileParent>,
        options: FileOptions,
    ) -> CoreResult<Self> {
        let prefix = options
            .prefix
            .unwrap_or_else(|| DEFAULT_DSID_PREFIX.to_string());
        validate_prefix(&prefix)?;
        let mut file = Self::build(repo, file_type, Identity::Child { parent, prefix });
        if let Some(dsid) = options.dsid {
            file.dsid = OnceCell::with_value(Dsid::new(dsid)?);
        }
        file.mime_type = options.mime_type;
        file.original_name = options.original_name;
        Ok(file)
    }

    /// [`child`](Self::child) for a parent held in an `Arc`.
    pub fn child_of<P: FileParent + 'static>(
        repo: &Repository,
        file_type: Arc<FileType>,
        parent: &Arc<P>,
        options: FileOptions,
    ) -> CoreResult<Self> {
        let weak: Weak<P> = Arc::downgrade(parent);
        Self::child(repo, file_type, weak, options)
    }

    /// Load a persisted standalone file.
    pub fn load(repo: &Repository, file_type: Arc<FileType>, uri: &ResourceUri) -> CoreResult<Self> {
        let mut file = Self::build(
            repo,
            file_type,
            Identity::Standalone {
                uri: Some(uri.clone()),
            },
        );
        file.refresh_from(uri)?;
        Ok(file)
    }

    /// Load a persisted file below `parent`.
    pub(crate) fn load_child(
        repo: &Repository,
        file_type: Arc<FileType>,
        parent: Weak<dyn FileParent>,
        uri: &ResourceUri,
    ) -> CoreResult<Self> {
        let mut file = Self::build(
            repo,
            file_type,
            Identity::Child {
                parent,
                prefix: DEFAULT_DSID_PREFIX.to_string(),
            },
        );
        file.dsid = OnceCell::with_value(Dsid::new(uri.id())?);
        file.refresh_from(uri)?;
        Ok(file)
    }

    fn build(repo: &Repository, file_type: Arc<FileType>, identity: Identity) -> Self {
        Self {
            repo: repo.clone(),
            file_type,
            identity,
            dsid: OnceCell::new(),
            content: None,
            content_changed: false,
            original_name: None,
            mime_type: None,
            new_record: true,
            remote_size: OnceCell::new(),
            metadata: None,
        }
    }

    fn refresh_from(&mut self, uri: &ResourceUri) -> CoreResult<()> {
        let head = self.repo.transport().head(uri)?;
        if head.status.is_not_found() {
            return Err(CoreError::NotFound(uri.to_string()));
        }
        head.status.ensure_success("HEAD", uri.as_str())?;

        self.mime_type = head.headers.content_type().map(str::to_string);
        self.original_name = head.headers.filename();
        self.remote_size = OnceCell::with_value(head.headers.content_length());
        self.new_record = false;
        self.metadata = match self.file_type.metadata_schema() {
            Some(schema) => Some(MetadataNode::load(
                schema.clone(),
                self.repo.transport(),
                uri,
            )?),
            None => None,
        };
        debug!(uri = %uri, "file loaded");
        Ok(())
    }

    // ---- Identity ----

    /// The file's dsid, allocating one under the configured prefix the first
    /// time it is needed.
    pub fn dsid(&self) -> CoreResult<&Dsid> {
        match &self.identity {
            Identity::Child { prefix, .. } => self.dsid.get_or_try_init(|| self.generate_dsid(prefix)),
            Identity::Standalone { uri: Some(uri) } => self
                .dsid
                .get_or_try_init(|| Dsid::new(uri.id()).map_err(CoreError::from)),
            Identity::Standalone { uri: None } => Err(CoreError::NotPersisted(self.describe())),
        }
    }

    /// Next free dsid under `prefix` among the parent's attached files.
    ///
    /// Reads the sibling set without locking it against other allocators;
    /// callers serialize allocation per parent.
    pub fn generate_dsid(&self, prefix: &str) -> CoreResult<Dsid> {
        validate_prefix(prefix)?;
        let parent = self.parent()?;
        let dsid = next_dsid(prefix, parent.attached_file_keys());
        debug!(prefix, dsid = %dsid, "allocated dsid");
        Ok(dsid)
    }

    /// `<parent uri>/<dsid>` for child files, the file's own URI otherwise.
    pub fn uri(&self) -> CoreResult<ResourceUri> {
        match &self.identity {
            Identity::Child { .. } => {
                let parent = self.parent()?;
                let base = parent.uri().ok_or_else(|| {
                    CoreError::InvalidParent("parent has no uri".to_string())
                })?;
                Ok(base.join(self.dsid()?.as_str()))
            }
            Identity::Standalone { uri: Some(uri) } => Ok(uri.clone()),
            Identity::Standalone { uri: None } => Err(CoreError::NotPersisted(self.describe())),
        }
    }

    /// The URI if one can be known without saving anything. A parent that
    /// has not been given a URI yet means nothing is stored.
    fn known_uri(&self) -> CoreResult<Option<ResourceUri>> {
        match &self.identity {
            Identity::Child { .. } if self.parent()?.uri().is_none() => Ok(None),
            Identity::Standalone { uri: None } => Ok(None),
            _ => self.uri().map(Some),
        }
    }

    /// URL-segment form of the dsid, with `.` escaped as `%2e`.
    pub fn to_param(&self) -> CoreResult<String> {
        Ok(self.dsid()?.to_param())
    }

    pub fn file_type(&self) -> &FileType {
        &self.file_type
    }

    /// `true` until the first successful content save.
    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    /// Plain files are binaries, not metadata datastreams.
    pub fn is_metadata(&self) -> bool {
        false
    }

    fn parent(&self) -> CoreResult<Arc<dyn FileParent>> {
        match &self.identity {
            Identity::Child { parent, .. } => parent
                .upgrade()
                .ok_or_else(|| CoreError::InvalidParent("parent object was dropped".to_string())),
            Identity::Standalone { .. } => {
                Err(CoreError::InvalidParent("file has no parent".to_string()))
            }
        }
    }

    fn describe(&self) -> String {
        format!("new {}", self.file_type.name)
    }

    // ---- Content ----

    pub fn content(&self) -> Option<&ContentSource> {
        self.content.as_ref()
    }

    /// Replace the local content. It is uploaded on the next save.
    pub fn set_content(&mut self, content: impl Into<ContentSource>) {
        self.content = Some(content.into());
        self.content_changed = true;
        self.remote_size = OnceCell::new();
    }

    pub fn is_content_changed(&self) -> bool {
        self.content_changed
    }

    /// The stored body, fetched with a GET. `None` if nothing is stored.
    pub fn remote_content(&self) -> CoreResult<Option<Bytes>> {
        let Some(uri) = self.known_uri()? else {
            return Ok(None);
        };
        let response = self.repo.transport().get(&uri)?;
        if response.status.is_not_found() {
            return Ok(None);
        }
        response.status.ensure_success("GET", uri.as_str())?;
        Ok(Some(response.body))
    }

    /// Content size in bytes.
    ///
    /// Local content is measured directly. Otherwise the size comes from a
    /// HEAD against the file's URI, made once and cached; the body is never
    /// downloaded. A missing resource or `Content-Length` gives `None`.
    pub fn size(&mut self) -> CoreResult<Option<u64>> {
        if let Some(content) = self.content.as_mut() {
            return Ok(Some(content.len()?));
        }
        let Some(uri) = self.known_uri()? else {
            return Ok(None);
        };
        let transport = self.repo.transport();
        let size = self.remote_size.get_or_try_init(|| -> CoreResult<Option<u64>> {
            let head = transport.head(&uri)?;
            if head.status.is_not_found() {
                return Ok(None);
            }
            head.status.ensure_success("HEAD", uri.as_str())?;
            Ok(head.headers.content_length())
        })?;
        Ok(*size)
    }

    /// No size, or a size of zero.
    pub fn is_empty(&mut self) -> CoreResult<bool> {
        Ok(self.size()?.unwrap_or(0) == 0)
    }

    /// A size greater than zero.
    pub fn has_content(&mut self) -> CoreResult<bool> {
        Ok(self.size()?.is_some_and(|n| n > 0))
    }

    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    /// Recorded locally; sent with the next content upload.
    pub fn set_original_name(&mut self, name: impl Into<String>) {
        self.original_name = Some(name.into());
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Recorded locally; sent with the next content upload.
    pub fn set_mime_type(&mut self, mime_type: impl Into<String>) {
        self.mime_type = Some(mime_type.into());
    }

    // ---- Metadata ----

    /// The metadata node, created on first access for types that declare
    /// metadata. `None` for types without a schema.
    pub fn metadata(&mut self) -> Option<&mut MetadataNode> {
        if self.metadata.is_none() {
            let schema = self.file_type.metadata_schema()?.clone();
            self.metadata = Some(MetadataNode::new(schema));
        }
        self.metadata.as_mut()
    }

    /// The metadata node if it already exists.
    pub fn metadata_node(&self) -> Option<&MetadataNode> {
        self.metadata.as_ref()
    }

    /// Values of a declared metadata property.
    pub fn property(&mut self, name: &str) -> CoreResult<&[String]> {
        match self.metadata() {
            Some(node) => node.get(name),
            None => Err(CoreError::UnknownProperty(name.to_string())),
        }
    }

    /// Set a declared metadata property, marking it changed.
    pub fn set_property<I, S>(&mut self, name: &str, values: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.metadata() {
            Some(node) => node.set(name, values),
            None => Err(CoreError::UnknownProperty(name.to_string())),
        }
    }

    /// Whether a declared property was set since load or the last save.
    pub fn property_changed(&self, name: &str) -> CoreResult<bool> {
        match (&self.metadata, self.file_type.metadata_schema()) {
            (Some(node), _) => node.is_changed(name),
            (None, Some(schema)) if schema.property(name).is_some() => Ok(false),
            _ => Err(CoreError::UnknownProperty(name.to_string())),
        }
    }

    // ---- Persistence ----

    /// Persist the file: content first, then metadata.
    ///
    /// - A new file without content is skipped and its metadata untouched.
    /// - A failed upload returns the error before metadata is attempted and
    ///   leaves [`is_new_record`](Self::is_new_record) as it was.
    /// - Metadata is written only once the file is durable, either because
    ///   this call uploaded it or because it was already persisted.
    pub fn save(&mut self) -> CoreResult<SaveOutcome> {
        let has_pending_content = self.content_changed && self.content.is_some();
        if self.new_record && !has_pending_content {
            debug!(file = %self.inspect(), "save skipped: new file without content");
            return Ok(SaveOutcome::Skipped(SkipReason::NoContent));
        }

        let uri = self.uri_for_save()?;
        let content_saved = if has_pending_content {
            self.upload(&uri)?;
            true
        } else {
            false
        };

        let metadata_saved = match self.metadata.as_mut() {
            Some(node) => node
                .save(self.repo.transport(), &uri, self.new_record)?
                .is_saved(),
            None => false,
        };

        if content_saved || metadata_saved {
            Ok(SaveOutcome::Saved)
        } else {
            Ok(SaveOutcome::Skipped(SkipReason::Unchanged))
        }
    }

    fn uri_for_save(&mut self) -> CoreResult<ResourceUri> {
        if let Identity::Standalone { uri } = &mut self.identity {
            if uri.is_none() {
                let minted = self.repo.mint_uri();
                debug!(uri = %minted, "minted uri for standalone file");
                *uri = Some(minted);
            }
        }
        self.uri()
    }

    fn upload(&mut self, uri: &ResourceUri) -> CoreResult<()> {
        let Some(content) = self.content.as_mut() else {
            return Ok(());
        };
        let body = content.read_to_bytes()?;
        let len = body.len() as u64;

        let mut headers = Headers::new().with(
            CONTENT_TYPE,
            self.mime_type.as_deref().unwrap_or(OCTET_STREAM),
        );
        if let Some(name) = &self.original_name {
            headers.insert(CONTENT_DISPOSITION, attachment_disposition(name));
        }

        self.repo
            .transport()
            .put(uri, body, &headers)?
            .ensure_success("PUT", uri.as_str())?;

        self.new_record = false;
        self.content_changed = false;
        self.remote_size = OnceCell::with_value(Some(len));
        info!(uri = %uri, bytes = len, "file content saved");
        Ok(())
    }

    /// Delete the file and its metadata from the repository.
    ///
    /// Afterwards the file is new again, with no content and no metadata.
    pub fn delete(&mut self) -> CoreResult<()> {
        let uri = self.uri()?;
        let status = self.repo.transport().delete(&uri)?;
        if !status.is_not_found() {
            status.ensure_success("DELETE", uri.as_str())?;
        }
        self.new_record = true;
        self.content = None;
        self.content_changed = false;
        self.remote_size = OnceCell::new();
        self.metadata = None;
        info!(uri = %uri, "file deleted");
        Ok(())
    }

    /// `#<TypeName uri="<uri>" >`, with an empty URI while it is unknown.
    pub fn inspect(&self) -> String {
        let uri = self.uri().map(|u| u.to_string()).unwrap_or_default();
        format!("#<{} uri=\"{}\" >", self.file_type.name, uri)
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}
