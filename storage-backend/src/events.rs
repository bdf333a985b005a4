use serde_json::Value;
use shared_types::{Kind, Metadata, Resource, ResourceKey};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Result, StorageError};

/// A resource as observed on the backing medium, without its kind's type.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResource {
    pub key: ResourceKey,
    pub metadata: Metadata,
    /// The full persisted document, metadata block included.
    pub document: Value,
}

impl StoredResource {
    pub fn decode<T: Resource>(&self) -> Result<T> {
        if T::KIND != self.key.kind {
            return Err(StorageError::Validation(format!(
                "cannot decode {} as {}",
                self.key,
                T::KIND
            )));
        }
        Ok(serde_json::from_value(self.document.clone())?)
    }

    pub(crate) fn differs_from(&self, other: &StoredResource) -> bool {
        self.metadata.resource_version != other.metadata.resource_version
            || self.document != other.document
    }
}

/// Change detected by a resync scan relative to the previous scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    Added(StoredResource),
    Updated {
        previous: StoredResource,
        current: StoredResource,
    },
    Removed(StoredResource),
}

impl ResourceEvent {
    pub fn key(&self) -> &ResourceKey {
        &self.resource().key
    }

    pub fn kind(&self) -> Kind {
        self.key().kind
    }

    /// The latest known state: the new value for adds and updates, the last
    /// observed value for removals.
    pub fn resource(&self) -> &StoredResource {
        match self {
            Self::Added(resource) | Self::Removed(resource) => resource,
            Self::Updated { current, .. } => current,
        }
    }
}

/// Receives resync notifications.
///
/// Called synchronously from the resync task, so implementations should hand
/// work off rather than block.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &ResourceEvent);

    /// Closed sinks are dropped from the subscriber list.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> EventSink for F
where
    F: Fn(&ResourceEvent) + Send + Sync,
{
    fn notify(&self, event: &ResourceEvent) {
        self(event);
    }
}

impl EventSink for UnboundedSender<ResourceEvent> {
    fn notify(&self, event: &ResourceEvent) {
        let _ = self.send(event.clone());
    }

    fn is_closed(&self) -> bool {
        UnboundedSender::is_closed(self)
    }
}
