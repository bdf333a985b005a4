use shared_types::{Kind, Resource, ResourceKey};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::Result;
use crate::events::{EventSink, ResourceEvent, StoredResource};

/// Read view of the medium kept current by resync notifications.
///
/// Trails the medium by at most one resync interval.
#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: RwLock<HashMap<ResourceKey, StoredResource>>,
}

impl ResourceCache {
    pub fn seeded(resources: impl IntoIterator<Item = StoredResource>) -> Self {
        let entries = resources
            .into_iter()
            .map(|resource| (resource.key.clone(), resource))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn get(&self, key: &ResourceKey) -> Option<StoredResource> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn get_typed<T: Resource>(&self, namespace: &str, name: &str) -> Result<Option<T>> {
        self.get(&ResourceKey::new(T::KIND, namespace, name))
            .map(|stored| stored.decode())
            .transpose()
    }

    /// Cached resources of one kind, ordered by name then namespace.
    pub fn list(&self, kind: Kind) -> Vec<StoredResource> {
        let mut resources: Vec<StoredResource> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|resource| resource.key.kind == kind)
            .cloned()
            .collect();
        resources.sort_by(|a, b| a.key.cmp(&b.key));
        resources
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply(&self, event: &ResourceEvent) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            ResourceEvent::Added(resource) | ResourceEvent::Updated { current: resource, .. } => {
                entries.insert(resource.key.clone(), resource.clone());
            }
            ResourceEvent::Removed(resource) => {
                entries.remove(&resource.key);
            }
        }
    }
}

impl EventSink for ResourceCache {
    fn notify(&self, event: &ResourceEvent) {
        self.apply(event);
    }
}
