use async_trait::async_trait;
use shared_types::{DEFAULT_NAMESPACE, Resource};

use crate::error::Result;

/// CRUD contract for one resource kind.
///
/// Backends guarantee that a mutation is either fully visible or not at all,
/// and that `update` is a compare-and-swap on `resourceVersion`.
#[async_trait]
pub trait ResourceClient<T: Resource>: Send + Sync {
    /// Persists a new resource and returns it with store-assigned metadata.
    ///
    /// # Errors
    /// Returns `StorageError::AlreadyExists` if the identity is live.
    async fn create(&self, resource: &T) -> Result<T>;

    async fn get_in(&self, namespace: &str, name: &str) -> Result<T>;

    /// Replaces the stored resource if `resource` carries its current version.
    ///
    /// # Errors
    /// Returns `StorageError::VersionConflict` when the presented version is
    /// stale or empty; the stored resource is left untouched.
    async fn update(&self, resource: &T) -> Result<T>;

    async fn delete_in(&self, namespace: &str, name: &str) -> Result<()>;

    /// Every live resource of the kind, ordered by name then namespace.
    async fn list(&self) -> Result<Vec<T>>;

    async fn list_in(&self, namespace: &str) -> Result<Vec<T>>;

    async fn get(&self, name: &str) -> Result<T> {
        self.get_in(DEFAULT_NAMESPACE, name).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.delete_in(DEFAULT_NAMESPACE, name).await
    }
}
