//! Collaborator seams: document store, file storage, fog reset.
//!
//! DESIGN
//! ======
//! The engine never touches host state directly. Every suspension point of a
//! rotation is a call through one of these traits, so a host binds its own
//! persistence and file service and tests bind in-memory doubles.

use async_trait::async_trait;

use crate::error::{FogError, StorageError, StoreError};
use crate::scene::{EmbeddedKind, Entity, Scene};
use crate::update::UpdatePayload;

/// One scene document and its embedded collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current scene-level settings.
    async fn scene(&self) -> Result<Scene, StoreError>;

    /// Embedded documents of one kind, in store order.
    async fn embedded_entities(&self, kind: EmbeddedKind) -> Result<Vec<Entity>, StoreError>;

    /// Apply the whole payload as one transaction.
    async fn commit(&self, payload: UpdatePayload) -> Result<(), StoreError>;
}

/// Host file service. Paths are `/`-separated and relative to the service root.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// File paths directly inside `directory`.
    async fn list(&self, directory: &str) -> Result<Vec<String>, StorageError>;

    /// Create `directory`; succeeds if it already exists.
    async fn create_directory(&self, directory: &str) -> Result<(), StorageError>;

    /// Store `bytes` as `directory/filename` and return the final path.
    async fn upload(&self, directory: &str, filename: &str, bytes: Vec<u8>, mime_type: &str)
    -> Result<String, StorageError>;

    /// Read a file's bytes.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Clears explored fog-of-war for the scene being rotated.
#[async_trait]
pub trait FogReset: Send + Sync {
    async fn reset(&self) -> Result<(), FogError>;
}
