//! In-memory collaborators.
//!
//! DESIGN
//! ======
//! `MemoryScene` keeps the scene as a raw JSON document, the same shape a
//! host stores, and applies a commit to a clone that is swapped in only when
//! every record applied. A failed commit leaves the document untouched.
//! `MemoryStorage` is a flat path → bytes map with explicit directories so
//! listing a missing directory fails the way a real file service does.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{FogError, StorageError, StoreError};
use crate::scene::{EmbeddedKind, Entity, Scene};
use crate::store::{DocumentStore, FileStorage, FogReset};
use crate::update::{ID_FIELD, UpdatePayload, apply_record};

// =============================================================================
// SCENE DOCUMENT
// =============================================================================

/// Parse the scene-level settings out of a raw scene document.
///
/// # Errors
///
/// Returns `Json` if the document lacks the required scene fields.
pub fn parse_scene(document: &Value) -> Result<Scene, StoreError> {
    Ok(serde_json::from_value(document.clone())?)
}

/// Typed embedded documents of one kind. A missing collection is empty.
///
/// # Errors
///
/// Returns `Malformed` if the collection is not an array, or `Json` if an
/// item does not match its kind's schema.
pub fn parse_entities(document: &Value, kind: EmbeddedKind) -> Result<Vec<Entity>, StoreError> {
    match document.get(kind.collection()) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| Entity::from_document(kind.document_name(), item.clone()).map_err(StoreError::from))
            .collect(),
        Some(_) => Err(StoreError::Malformed(format!("`{}` is not an array", kind.collection()))),
    }
}

/// Apply a payload to a copy of `document`.
///
/// # Errors
///
/// Returns `NotFound` for an update naming a missing embedded document and
/// `Rejected` for a field path that cannot be set. Nothing is applied then.
pub fn apply_payload(document: &Value, payload: &UpdatePayload) -> Result<Value, StoreError> {
    let mut next = document.clone();
    if !apply_record(&mut next, &payload.scene) {
        return Err(StoreError::Rejected("scene field path blocked by a non-object value".into()));
    }

    for (kind, updates) in &payload.embedded {
        let collection = kind.collection();
        let Some(Value::Array(items)) = next.get_mut(collection) else {
            return Err(StoreError::Malformed(format!("`{collection}` is not an array")));
        };
        for update in updates {
            let item = items
                .iter_mut()
                .find(|item| item.get(ID_FIELD).and_then(Value::as_str) == Some(update.id.as_str()))
                .ok_or_else(|| StoreError::NotFound { collection: collection.into(), id: update.id.clone() })?;
            if !apply_record(item, &update.record) {
                return Err(StoreError::Rejected(format!("{collection}/{}: field path blocked", update.id)));
            }
        }
    }
    Ok(next)
}

// =============================================================================
// MEMORY SCENE
// =============================================================================

/// In-memory [`DocumentStore`] and [`FogReset`] for one scene.
pub struct MemoryScene {
    document: RwLock<Value>,
    commits: AtomicUsize,
    fog_resets: AtomicUsize,
}

impl MemoryScene {
    /// # Errors
    ///
    /// Returns an error if `document` is not a valid scene.
    pub fn new(document: Value) -> Result<Self, StoreError> {
        parse_scene(&document)?;
        Ok(Self { document: RwLock::new(document), commits: AtomicUsize::new(0), fog_resets: AtomicUsize::new(0) })
    }

    pub async fn document(&self) -> Value {
        self.document.read().await.clone()
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn fog_resets(&self) -> usize {
        self.fog_resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryScene {
    async fn scene(&self) -> Result<Scene, StoreError> {
        parse_scene(&*self.document.read().await)
    }

    async fn embedded_entities(&self, kind: EmbeddedKind) -> Result<Vec<Entity>, StoreError> {
        parse_entities(&*self.document.read().await, kind)
    }

    async fn commit(&self, payload: UpdatePayload) -> Result<(), StoreError> {
        let mut document = self.document.write().await;
        *document = apply_payload(&document, &payload)?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl FogReset for MemoryScene {
    async fn reset(&self) -> Result<(), FogError> {
        self.fog_resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// In-memory [`FileStorage`].
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    directories: RwLock<BTreeSet<String>>,
    uploads: AtomicUsize,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file, creating its parent directories.
    pub async fn insert(&self, path: &str, bytes: Vec<u8>) {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_directories(parent).await;
        }
        self.files.write().await.insert(path.to_string(), bytes);
    }

    pub async fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().await.get(path).cloned()
    }

    /// Number of successful uploads.
    #[must_use]
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    async fn add_directories(&self, directory: &str) {
        let mut directories = self.directories.write().await;
        let mut prefix = String::new();
        for segment in directory.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            directories.insert(prefix.clone());
        }
    }

    async fn has_directory(&self, directory: &str) -> bool {
        directory.is_empty() || self.directories.read().await.contains(directory)
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError> {
        if !self.has_directory(directory).await {
            return Err(StorageError::NotFound(directory.to_string()));
        }
        let files = self.files.read().await;
        Ok(files
            .keys()
            .filter(|path| path.rsplit_once('/').map_or("", |(parent, _)| parent) == directory)
            .cloned()
            .collect())
    }

    async fn create_directory(&self, directory: &str) -> Result<(), StorageError> {
        self.add_directories(directory).await;
        Ok(())
    }

    async fn upload(
        &self,
        directory: &str,
        filename: &str,
        bytes: Vec<u8>,
        _mime_type: &str,
    ) -> Result<String, StorageError> {
        if !self.has_directory(directory).await {
            return Err(StorageError::NotFound(directory.to_string()));
        }
        let path = if directory.is_empty() { filename.to_string() } else { format!("{directory}/{filename}") };
        self.files.write().await.insert(path.clone(), bytes);
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.get(path)
            .await
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
