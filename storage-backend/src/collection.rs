use async_trait::async_trait;
use chrono::Utc;
use object_store::{ObjectStore, PutMode, PutPayload};
use shared_types::{Metadata, Resource, ResourceKey};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::layout;
use crate::lock::KeyLocks;
use crate::traits::ResourceClient;

const FIRST_VERSION: u64 = 1;

/// File-backed collection of one resource kind.
///
/// Every document is published with a single atomic filesystem operation, so
/// readers (including the resync scan) see either the old or the new
/// document. Mutations on the same identity are serialized in-process.
pub struct FileCollection<T> {
    store: Arc<dyn ObjectStore>,
    locks: KeyLocks,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Resource> FileCollection<T> {
    pub(crate) fn new(store: Arc<dyn ObjectStore>, locks: KeyLocks) -> Self {
        Self {
            store,
            locks,
            _kind: PhantomData,
        }
    }

    async fn read(&self, key: &ResourceKey) -> Result<T> {
        let bytes = layout::read_bytes(&*self.store, key)
            .await?
            .ok_or_else(|| StorageError::NotFound { key: key.clone() })?;
        layout::decode_resource(key, &bytes)
    }

    async fn read_all(&self, keys: Vec<ResourceKey>) -> Result<Vec<T>> {
        let mut resources = Vec::with_capacity(keys.len());
        for key in keys {
            match self.read(&key).await {
                Ok(resource) => resources.push(resource),
                // Deleted between listing and reading.
                Err(StorageError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(resources)
    }
}

/// The presented metadata must carry the stored version, and when it names a
/// lineage (`uid`), the same lineage.
fn check_version(key: &ResourceKey, presented: &Metadata, stored: &Metadata) -> Result<()> {
    let version_matches = !presented.resource_version.is_empty()
        && presented.resource_version == stored.resource_version;
    let lineage_matches = presented.uid.is_empty() || presented.uid == stored.uid;

    if version_matches && lineage_matches {
        Ok(())
    } else {
        Err(StorageError::VersionConflict {
            key: key.clone(),
            expected: presented.resource_version.clone(),
            actual: stored.resource_version.clone(),
        })
    }
}

/// Versions are decimal counters; anything else restarts the count.
fn next_version(current: &str) -> String {
    current
        .parse::<u64>()
        .map_or(FIRST_VERSION, |n| n.saturating_add(1))
        .to_string()
}

#[async_trait]
impl<T: Resource> ResourceClient<T> for FileCollection<T> {
    #[instrument(skip(self, resource), fields(kind = %T::KIND, name = %resource.name()))]
    async fn create(&self, resource: &T) -> Result<T> {
        let key = layout::resource_key(resource)?;

        let mut created = resource.clone();
        let metadata = created.metadata_mut();
        metadata.namespace.clone_from(&key.namespace);
        metadata.resource_version = FIRST_VERSION.to_string();
        metadata.uid = Uuid::new_v4().to_string();
        metadata.creation_timestamp = Some(Utc::now());

        let payload = PutPayload::from(layout::encode(&created)?);
        let _guard = self.locks.acquire(&key).await;

        // Create mode publishes via hard link and fails if the file exists,
        // which also holds against writers in other processes.
        match self
            .store
            .put_opts(&layout::resource_path(&key), payload, PutMode::Create.into())
            .await
        {
            Ok(_) => {}
            Err(object_store::Error::AlreadyExists { .. }) => {
                return Err(StorageError::AlreadyExists { key });
            }
            Err(e) => return Err(e.into()),
        }

        info!("Created {} at version {}", key, created.resource_version());
        Ok(created)
    }

    #[instrument(skip(self), fields(kind = %T::KIND))]
    async fn get_in(&self, namespace: &str, name: &str) -> Result<T> {
        let key = layout::key_for(T::KIND, namespace, name)?;
        self.read(&key).await
    }

    #[instrument(skip(self, resource), fields(kind = %T::KIND, name = %resource.name()))]
    async fn update(&self, resource: &T) -> Result<T> {
        let key = layout::resource_key(resource)?;
        let _guard = self.locks.acquire(&key).await;

        let current = self.read(&key).await?;
        check_version(&key, resource.metadata(), current.metadata())?;

        let mut updated = resource.clone();
        let stored = current.metadata();
        let metadata = updated.metadata_mut();
        metadata.namespace.clone_from(&key.namespace);
        metadata.resource_version = next_version(&stored.resource_version);
        metadata.uid.clone_from(&stored.uid);
        metadata.creation_timestamp = stored.creation_timestamp;

        let payload = PutPayload::from(layout::encode(&updated)?);
        self.store
            .put(&layout::resource_path(&key), payload)
            .await?;

        info!(
            "Updated {} from version {} to {}",
            key,
            current.resource_version(),
            updated.resource_version()
        );
        Ok(updated)
    }

    #[instrument(skip(self), fields(kind = %T::KIND))]
    async fn delete_in(&self, namespace: &str, name: &str) -> Result<()> {
        let key = layout::key_for(T::KIND, namespace, name)?;
        let _guard = self.locks.acquire(&key).await;

        match self.store.delete(&layout::resource_path(&key)).await {
            Ok(()) => {
                info!("Deleted {}", key);
                Ok(())
            }
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::NotFound { key }),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(kind = %T::KIND))]
    async fn list(&self) -> Result<Vec<T>> {
        let keys = layout::list_keys(&*self.store, T::KIND, &layout::kind_prefix(T::KIND)).await?;
        debug!("Listing {} {}", keys.len(), T::KIND);
        self.read_all(keys).await
    }

    #[instrument(skip(self), fields(kind = %T::KIND))]
    async fn list_in(&self, namespace: &str) -> Result<Vec<T>> {
        layout::validate_segment("namespace", namespace)?;
        let prefix = layout::namespace_prefix(T::KIND, namespace);
        let keys = layout::list_keys(&*self.store, T::KIND, &prefix).await?;
        self.read_all(keys).await
    }
}
