//! Error taxonomy for scene rotation.
//!
//! DESIGN
//! ======
//! Each collaborator boundary has its own error enum. `RotationError` is the
//! only type surfaced to callers: fatal variants come back as `Err`, while
//! recoverable variants are collected into the rotation report as warnings.
//! Codes are grepable (`E_*`) so a trigger surface can map them to messages.

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and recoverable flag.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    /// Recoverable errors are downgraded to warnings and never stop a rotation.
    fn recoverable(&self) -> bool {
        false
    }
}

// =============================================================================
// COLLABORATOR ERRORS
// =============================================================================

/// Errors reported by a [`crate::store::DocumentStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("embedded document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("malformed scene document: {0}")]
    Malformed(String),
    #[error("update rejected: {0}")]
    Rejected(String),
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("scene json invalid: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "E_DOCUMENT_NOT_FOUND",
            Self::Malformed(_) => "E_DOCUMENT_MALFORMED",
            Self::Rejected(_) => "E_UPDATE_REJECTED",
            Self::Io(_) => "E_STORE_IO",
            Self::Json(_) => "E_STORE_JSON",
        }
    }
}

/// Errors reported by a [`crate::store::FileStorage`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("path escapes storage root: {0}")]
    OutsideRoot(String),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage rejected request: {0}")]
    Rejected(String),
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_STORAGE_NOT_FOUND",
            Self::OutsideRoot(_) => "E_STORAGE_OUTSIDE_ROOT",
            Self::Io(_) => "E_STORAGE_IO",
            Self::Rejected(_) => "E_STORAGE_REJECTED",
        }
    }
}

/// Errors reported by a [`crate::store::FogReset`] collaborator.
#[derive(Debug, thiserror::Error)]
pub enum FogError {
    #[error("fog reset failed: {0}")]
    ResetFailed(String),
}

/// Failures inside the image rotation cache.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("source image path is empty")]
    EmptyPath,
    #[error("source image unreadable: {0}")]
    Read(#[source] StorageError),
    #[error("image decode failed: {0}")]
    Decode(#[source] image::ImageError),
    #[error("image encode failed: {0}")]
    Encode(#[source] image::ImageError),
    #[error("render worker failed: {0}")]
    Worker(#[source] tokio::task::JoinError),
    #[error("upload failed: {0}")]
    Upload(#[source] StorageError),
}

// =============================================================================
// ROTATION ERROR
// =============================================================================

/// Top-level error surfaced by a scene rotation.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("invalid rotation step {0}: expected ±90, ±180 or ±270")]
    InvalidRotationStep(i32),
    #[error("entity planning failed: {0}")]
    PlanningFailure(String),
    #[error("image rotation failed for {path}: {source}")]
    ImageRotationFailed {
        path: String,
        #[source]
        source: ImageError,
    },
    #[error("no fog reset capability available for this scene")]
    FogResetUnavailable,
    #[error("fog reset failed: {0}")]
    FogResetFailed(#[source] FogError),
    #[error("commit failed: {0}")]
    CommitFailure(#[source] StoreError),
}

impl ErrorCode for RotationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRotationStep(_) => "E_INVALID_ROTATION_STEP",
            Self::PlanningFailure(_) => "E_PLANNING_FAILURE",
            Self::ImageRotationFailed { .. } => "E_IMAGE_ROTATION_FAILED",
            Self::FogResetUnavailable => "E_FOG_RESET_UNAVAILABLE",
            Self::FogResetFailed(_) => "E_FOG_RESET_FAILED",
            Self::CommitFailure(_) => "E_COMMIT_FAILURE",
        }
    }

    fn recoverable(&self) -> bool {
        matches!(self, Self::ImageRotationFailed { .. } | Self::FogResetUnavailable | Self::FogResetFailed(_))
    }
}
