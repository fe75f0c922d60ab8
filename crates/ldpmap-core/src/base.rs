//! Parent objects: container resources that own a set of files.
//!
//! A [`Base`] lives at `<base uri>/<id>` and its files at
//! `<base uri>/<id>/<dsid>`. The model's [`ModelSchema`] declares which file
//! keys it knows about and their [`FileType`]s; any other dsid is an
//! undeclared, generically typed file.
//!
//! Objects are always handled as `Arc<Base>` so attached files can hold a
//! weak reference back to them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use ldpmap_transport::{Headers, CONTENT_TYPE, JSON_LD};
use ldpmap_types::{vocab, ResourceUri, TypeError};
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::content::ContentSource;
use crate::error::{CoreError, CoreResult};
use crate::file::{File, FileHandle, FileOptions, FileType};
use crate::files_hash::FilesHash;
use crate::parent::{FileContainer, FileParent};
use crate::repository::Repository;
use crate::save::{SaveOutcome, SkipReason};

/// A model: its name and the files it declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSchema {
    name: String,
    files: Vec<(String, Arc<FileType>)>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
        }
    }

    /// Declare a file under `key`. Declaring a key again replaces its type.
    pub fn file(mut self, key: impl Into<String>, file_type: FileType) -> Self {
        let key = key.into();
        let file_type = Arc::new(file_type);
        match self.files.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = file_type,
            None => self.files.push((key, file_type)),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_keys(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_declared(&self, key: &str) -> bool {
        self.files.iter().any(|(k, _)| k == key)
    }

    pub fn file_type(&self, key: &str) -> Option<&Arc<FileType>> {
        self.files.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }

    /// Declared type for `key`, or a plain [`FileType`] for undeclared keys.
    fn file_type_or_default(&self, key: Option<&str>) -> Arc<FileType> {
        key.and_then(|k| self.file_type(k))
            .cloned()
            .unwrap_or_default()
    }
}

struct BaseState {
    uri: Option<ResourceUri>,
    new_record: bool,
}

/// A repository object and its attached files.
///
/// The object state and the file map sit behind separate locks, and neither
/// is held while a file talks to the repository. Files attached concurrently
/// to the same object may be allocated the same dsid; allocate from one
/// writer per object.
pub struct Base {
    repo: Repository,
    schema: Arc<ModelSchema>,
    self_ref: Weak<Base>,
    state: RwLock<BaseState>,
    files: RwLock<BTreeMap<String, FileHandle>>,
}

impl Base {
    fn build(repo: &Repository, schema: Arc<ModelSchema>, uri: Option<ResourceUri>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            repo: repo.clone(),
            schema,
            self_ref: self_ref.clone(),
            state: RwLock::new(BaseState {
                uri,
                new_record: true,
            }),
            files: RwLock::new(BTreeMap::new()),
        })
    }

    /// A new object. Its id is minted on first save.
    pub fn new(repo: &Repository, schema: Arc<ModelSchema>) -> Arc<Self> {
        Self::build(repo, schema, None)
    }

    /// A new object with a caller-chosen id.
    pub fn with_id(repo: &Repository, schema: Arc<ModelSchema>, id: &str) -> CoreResult<Arc<Self>> {
        if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidUri {
                uri: id.to_string(),
                reason: "object id must be a single non-empty path segment".into(),
            }
            .into());
        }
        Ok(Self::build(repo, schema, Some(repo.uri_for_id(id))))
    }

    /// A new object, saved immediately.
    pub fn create(repo: &Repository, schema: Arc<ModelSchema>) -> CoreResult<Arc<Self>> {
        let base = Self::new(repo, schema);
        base.save()?;
        Ok(base)
    }

    /// Load a persisted object and the files it contains.
    pub fn load(repo: &Repository, schema: Arc<ModelSchema>, uri: &ResourceUri) -> CoreResult<Arc<Self>> {
        let base = Self::build(repo, schema, Some(uri.clone()));
        base.refresh(uri)?;
        Ok(base)
    }

    /// Re-read the object's files from the repository, discarding local
    /// changes.
    pub fn reload(&self) -> CoreResult<()> {
        let uri = self.persisted_uri()?;
        self.refresh(&uri)
    }

    fn refresh(&self, uri: &ResourceUri) -> CoreResult<()> {
        let response = self.repo.transport().get(uri)?;
        if response.status.is_not_found() {
            return Err(CoreError::NotFound(uri.to_string()));
        }
        response.status.ensure_success("GET", uri.as_str())?;
        let doc: Value = serde_json::from_slice(&response.body)
            .map_err(|e| CoreError::Serialization(format!("{uri}: {e}")))?;

        if let Some(model) = first_literal(&doc, vocab::fedora::HAS_MODEL.as_str()) {
            if model != self.schema.name {
                warn!(uri = %uri, stored = %model, expected = %self.schema.name, "model mismatch");
            }
        }

        let parent: Weak<dyn FileParent> = self.self_ref.clone();
        let mut files = BTreeMap::new();
        for child in contained_uris(&doc, uri) {
            let key = child.id().to_string();
            let file_type = self.schema.file_type_or_default(Some(key.as_str()));
            let file = File::load_child(&self.repo, file_type, parent.clone(), &child)?;
            files.insert(key, Arc::new(RwLock::new(file)));
        }

        debug!(uri = %uri, files = files.len(), "object loaded");
        *self.files.write() = files;
        self.state.write().new_record = false;
        Ok(())
    }

    /// Persist the object, then each attached file.
    ///
    /// A new object is written as a container first so that its files have
    /// somewhere to live. Files follow their own save rules; a file error
    /// stops the save and is returned.
    pub fn save(&self) -> CoreResult<SaveOutcome> {
        let created = if self.is_new_record() {
            self.write_container()?;
            true
        } else {
            false
        };

        let handles: Vec<FileHandle> = self.files.read().values().cloned().collect();
        let mut any_file_saved = false;
        for handle in handles {
            let outcome = handle.write().save()?;
            any_file_saved |= outcome.is_saved();
        }

        if created || any_file_saved {
            Ok(SaveOutcome::Saved)
        } else {
            Ok(SaveOutcome::Skipped(SkipReason::Unchanged))
        }
    }

    fn write_container(&self) -> CoreResult<()> {
        let uri = {
            let mut state = self.state.write();
            state
                .uri
                .get_or_insert_with(|| self.repo.mint_uri())
                .clone()
        };
        let doc = json!({
            "@id": uri.as_str(),
            (vocab::fedora::HAS_MODEL.as_str()): [{ "@value": self.schema.name }],
        });
        let body = serde_json::to_vec(&doc).map_err(|e| CoreError::Serialization(e.to_string()))?;
        let headers = Headers::new().with(CONTENT_TYPE, JSON_LD);
        self.repo
            .transport()
            .put(&uri, Bytes::from(body), &headers)?
            .ensure_success("PUT", uri.as_str())?;
        self.state.write().new_record = false;
        info!(uri = %uri, model = %self.schema.name, "object created");
        Ok(())
    }

    /// Delete the object and, with it, every file below it.
    pub fn destroy(&self) -> CoreResult<()> {
        let uri = self.persisted_uri()?;
        let status = self.repo.transport().delete(&uri)?;
        if !status.is_not_found() {
            status.ensure_success("DELETE", uri.as_str())?;
        }
        self.files.write().clear();
        self.state.write().new_record = true;
        info!(uri = %uri, "object destroyed");
        Ok(())
    }

    /// Attach new content as a file.
    ///
    /// The dsid comes from `options` or is allocated under its prefix
    /// (`DS` by default). The file is saved with the object.
    pub fn add_file(
        &self,
        content: impl Into<ContentSource>,
        options: FileOptions,
    ) -> CoreResult<FileHandle> {
        let file_type = self.schema.file_type_or_default(options.dsid.as_deref());
        let mut file = File::child(&self.repo, file_type, self.parent_ref(), options)?;
        file.set_content(content);
        let key = file.dsid()?.to_string();
        let handle = Arc::new(RwLock::new(file));
        if self
            .files
            .write()
            .insert(key.clone(), handle.clone())
            .is_some()
        {
            debug!(dsid = %key, "replaced attached file");
        }
        Ok(handle)
    }

    /// The file attached under `key`.
    ///
    /// A declared key with nothing attached yet gets an empty file of its
    /// declared type. Unknown keys give `None`.
    pub fn file(&self, key: &str) -> Option<FileHandle> {
        if let Some(handle) = self.files.read().get(key) {
            return Some(handle.clone());
        }
        let file_type = self.schema.file_type(key)?.clone();
        let file = match File::child(&self.repo, file_type, self.parent_ref(), FileOptions::dsid(key)) {
            Ok(file) => file,
            Err(e) => {
                warn!(key, error = %e, "declared file key is not a valid dsid");
                return None;
            }
        };
        let mut files = self.files.write();
        let handle = files
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(file)));
        Some(handle.clone())
    }

    /// Every attached file, declared or not, by key.
    pub fn attached_files(&self) -> Vec<(String, FileHandle)> {
        self.files
            .read()
            .iter()
            .map(|(k, f)| (k.clone(), f.clone()))
            .collect()
    }

    /// Read-only view of the files keyed by dsid.
    pub fn files(&self) -> FilesHash<'_, Self> {
        FilesHash::new(self)
    }

    pub fn uri(&self) -> Option<ResourceUri> {
        self.state.read().uri.clone()
    }

    pub fn id(&self) -> Option<String> {
        self.uri().map(|u| u.id().to_string())
    }

    /// `true` until the first successful save.
    pub fn is_new_record(&self) -> bool {
        self.state.read().new_record
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn parent_ref(&self) -> Weak<dyn FileParent> {
        self.self_ref.clone()
    }

    fn persisted_uri(&self) -> CoreResult<ResourceUri> {
        let state = self.state.read();
        match (&state.uri, state.new_record) {
            (Some(uri), false) => Ok(uri.clone()),
            _ => Err(CoreError::NotPersisted(format!("new {}", self.schema.name))),
        }
    }
}

impl FileParent for Base {
    fn uri(&self) -> Option<ResourceUri> {
        Base::uri(self)
    }

    fn is_new_record(&self) -> bool {
        Base::is_new_record(self)
    }

    fn attached_file_keys(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }
}

impl FileContainer for Base {
    type Target = FileHandle;

    fn declared_file_keys(&self) -> Vec<String> {
        self.schema.declared_keys().map(str::to_string).collect()
    }

    fn undeclared_file_keys(&self) -> Vec<String> {
        self.files
            .read()
            .keys()
            .filter(|k| !self.schema.is_declared(k))
            .cloned()
            .collect()
    }

    fn resolve_file(&self, key: &str) -> Option<FileHandle> {
        self.file(key)
    }
}

impl fmt::Debug for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uri = self.uri().map(|u| u.to_string()).unwrap_or_default();
        write!(f, "#<{} uri=\"{}\" >", self.schema.name, uri)
    }
}

/// Direct children listed under `ldp:contains`.
fn contained_uris(doc: &Value, container: &ResourceUri) -> Vec<ResourceUri> {
    let Some(entries) = doc.get(vocab::ldp::CONTAINS.as_str()) else {
        return Vec::new();
    };
    let entries = match entries {
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.as_str()),
            Value::Object(obj) => obj.get("@id").and_then(Value::as_str),
            _ => None,
        })
        .filter_map(|id| match ResourceUri::parse(id) {
            Ok(uri) if container.is_direct_child(&uri) => Some(uri),
            Ok(uri) => {
                warn!(container = %container, child = %uri, "ignoring non-child in containment");
                None
            }
            Err(e) => {
                warn!(container = %container, error = %e, "ignoring malformed contained uri");
                None
            }
        })
        .collect()
}

fn first_literal(doc: &Value, predicate: &str) -> Option<String> {
    let value = match doc.get(predicate)? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("@value")?.as_str().map(str::to_string),
        _ => None,
    }
}
