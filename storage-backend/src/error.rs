use shared_types::ResourceKey;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Resource not found: {key}")]
    NotFound { key: ResourceKey },

    #[error("Resource already exists: {key}")]
    AlreadyExists { key: ResourceKey },

    #[error("Version conflict on {key}: expected {expected:?}, but found {actual:?}")]
    VersionConflict {
        key: ResourceKey,
        expected: String,
        actual: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to prepare storage location {path:?}: {source}")]
    Registration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// I/O-level failure of the medium rather than a semantic CRUD outcome.
    pub fn is_backing_medium(&self) -> bool {
        matches!(
            self,
            Self::Backend(_) | Self::Io(_) | Self::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
