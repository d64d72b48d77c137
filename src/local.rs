//! Filesystem collaborators for the command-line rotation.
//!
//! DESIGN
//! ======
//! `LocalStorage` maps the `/`-separated storage paths a scene references
//! onto a data directory. Paths arrive percent-encoded the way a host
//! stores them and are decoded before touching disk; any `..` segment is
//! refused so a scene cannot reach outside the root.
//!
//! `SceneFile` is a scene document saved as JSON. A commit is applied to a
//! copy, written to a sibling temp file and renamed over the original, so a
//! failed commit leaves the file as it was.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{StorageError, StoreError};
use crate::memory::{apply_payload, parse_entities, parse_scene};
use crate::scene::{EmbeddedKind, Entity, Scene};
use crate::store::{DocumentStore, FileStorage};
use crate::update::UpdatePayload;

// =============================================================================
// LOCAL STORAGE
// =============================================================================

/// [`FileStorage`] rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a storage path to a location under the root.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for an undecodable path and `OutsideRoot` for a
    /// path with a `..` segment.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let decoded = urlencoding::decode(path).map_err(|e| StorageError::Rejected(format!("{path}: {e}")))?;
        let mut resolved = self.root.clone();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(StorageError::OutsideRoot(path.to_string())),
                _ => resolved.push(segment),
            }
        }
        Ok(resolved)
    }
}

fn join(directory: &str, filename: &str) -> String {
    let directory = directory.trim_end_matches('/');
    if directory.is_empty() { filename.to_string() } else { format!("{directory}/{filename}") }
}

fn io_error(path: &str, error: std::io::Error) -> StorageError {
    if error.kind() == ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(error)
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.resolve(directory)?;
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| io_error(directory, e))?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                files.push(join(directory, &urlencoding::encode(name)));
            }
        }
        files.sort();
        Ok(files)
    }

    async fn create_directory(&self, directory: &str) -> Result<(), StorageError> {
        let dir = self.resolve(directory)?;
        tokio::fs::create_dir_all(&dir).await?;
        debug!(directory = %dir.display(), "created storage directory");
        Ok(())
    }

    async fn upload(
        &self,
        directory: &str,
        filename: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<String, StorageError> {
        if filename.is_empty() || filename.contains('/') || filename == ".." || filename == "." {
            return Err(StorageError::Rejected(format!("invalid filename `{filename}`")));
        }
        let mut target = self.resolve(directory)?;
        target.push(filename);
        let size = bytes.len();
        tokio::fs::write(&target, bytes).await.map_err(|e| io_error(directory, e))?;
        info!(path = %target.display(), size, mime_type, "stored file");
        Ok(join(directory, &urlencoding::encode(filename)))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let file = self.resolve(path)?;
        tokio::fs::read(&file).await.map_err(|e| io_error(path, e))
    }
}

// =============================================================================
// SCENE FILE
// =============================================================================

/// [`DocumentStore`] backed by a JSON scene file.
pub struct SceneFile {
    path: PathBuf,
    document: RwLock<Value>,
}

impl SceneFile {
    /// Read and validate a scene file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Json` if it is not a
    /// scene document.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let text = tokio::fs::read_to_string(&path).await?;
        let document: Value = serde_json::from_str(&text)?;
        let scene = parse_scene(&document)?;
        debug!(path = %path.display(), scene = %scene.id, "loaded scene file");
        Ok(Self { path, document: RwLock::new(document) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn document(&self) -> Value {
        self.document.read().await.clone()
    }
}

#[async_trait]
impl DocumentStore for SceneFile {
    async fn scene(&self) -> Result<Scene, StoreError> {
        parse_scene(&*self.document.read().await)
    }

    async fn embedded_entities(&self, kind: EmbeddedKind) -> Result<Vec<Entity>, StoreError> {
        parse_entities(&*self.document.read().await, kind)
    }

    async fn commit(&self, payload: UpdatePayload) -> Result<(), StoreError> {
        let mut document = self.document.write().await;
        let next = apply_payload(&document, &payload)?;

        let text = serde_json::to_string_pretty(&next)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, text).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        *document = next;
        info!(path = %self.path.display(), "scene file committed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_test.rs"]
mod tests;
