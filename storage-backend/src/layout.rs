//! On-disk layout: `<kind>/<namespace>/<name>.json` under the store root.

use futures::StreamExt;
use object_store::ObjectStore;
use object_store::path::Path;
use serde_json::Value;
use shared_types::{Kind, Metadata, Resource, ResourceKey};

use crate::error::{Result, StorageError};
use crate::events::StoredResource;

const EXTENSION: &str = ".json";
const MAX_SEGMENT_LEN: usize = 253;

/// Names and namespaces become path segments, so only a conservative
/// character set is accepted.
pub(crate) fn validate_segment(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StorageError::Validation(format!("{what} must not be empty")));
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err(StorageError::Validation(format!(
            "{what} {value:?} is longer than {MAX_SEGMENT_LEN} characters"
        )));
    }
    if value.starts_with('.') {
        return Err(StorageError::Validation(format!(
            "{what} {value:?} must not start with '.'"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(StorageError::Validation(format!(
            "{what} {value:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

pub(crate) fn key_for(kind: Kind, namespace: &str, name: &str) -> Result<ResourceKey> {
    validate_segment("namespace", namespace)?;
    validate_segment("name", name)?;
    Ok(ResourceKey::new(kind, namespace, name))
}

pub(crate) fn resource_key<T: Resource>(resource: &T) -> Result<ResourceKey> {
    key_for(T::KIND, resource.namespace(), resource.name())
}

pub(crate) fn resource_path(key: &ResourceKey) -> Path {
    Path::from(format!(
        "{}/{}/{}{EXTENSION}",
        key.kind.as_str(),
        key.namespace,
        key.name
    ))
}

pub(crate) fn kind_prefix(kind: Kind) -> Path {
    Path::from(kind.as_str())
}

pub(crate) fn namespace_prefix(kind: Kind, namespace: &str) -> Path {
    kind_prefix(kind).child(namespace)
}

/// Maps a listed object back to its identity, ignoring anything that is not
/// a resource document (stray files, nested directories, bad names).
pub(crate) fn key_from_path(kind: Kind, path: &Path) -> Option<ResourceKey> {
    let parts: Vec<_> = path.parts().collect();
    let [dir, namespace, file] = parts.as_slice() else {
        return None;
    };
    let (dir, namespace, file): (&str, &str, &str) =
        (dir.as_ref(), namespace.as_ref(), file.as_ref());
    if dir != kind.as_str() {
        return None;
    }
    let name = file.strip_suffix(EXTENSION)?;
    key_for(kind, namespace, name).ok()
}

/// Identities of every document under `prefix`, sorted.
pub(crate) async fn list_keys(
    store: &dyn ObjectStore,
    kind: Kind,
    prefix: &Path,
) -> Result<Vec<ResourceKey>> {
    let mut keys = Vec::new();
    let mut stream = store.list(Some(prefix));

    while let Some(meta) = stream.next().await.transpose()? {
        if let Some(key) = key_from_path(kind, &meta.location) {
            keys.push(key);
        }
    }

    keys.sort();
    Ok(keys)
}

/// Raw bytes of a document, `None` when it does not exist.
pub(crate) async fn read_bytes(
    store: &dyn ObjectStore,
    key: &ResourceKey,
) -> Result<Option<Vec<u8>>> {
    match store.get(&resource_path(key)).await {
        Ok(result) => Ok(Some(result.bytes().await?.to_vec())),
        Err(object_store::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Decodes a typed resource; the location wins over whatever identity the
/// document claims.
pub(crate) fn decode_resource<T: Resource>(key: &ResourceKey, bytes: &[u8]) -> Result<T> {
    let mut resource: T = serde_json::from_slice(bytes)?;
    let metadata = resource.metadata_mut();
    metadata.name.clone_from(&key.name);
    metadata.namespace.clone_from(&key.namespace);
    Ok(resource)
}

/// Kind-erased decode used by the resync scan.
pub(crate) fn decode_stored(key: &ResourceKey, bytes: &[u8]) -> Result<StoredResource> {
    let mut document: Value = serde_json::from_slice(bytes)?;
    let raw = document
        .get("metadata")
        .cloned()
        .ok_or_else(|| StorageError::Validation(format!("{key} has no metadata block")))?;

    let mut metadata: Metadata = serde_json::from_value(raw)?;
    metadata.name.clone_from(&key.name);
    metadata.namespace.clone_from(&key.namespace);
    document["metadata"] = serde_json::to_value(&metadata)?;

    Ok(StoredResource {
        key: key.clone(),
        metadata,
        document,
    })
}

pub(crate) fn encode<T: Resource>(resource: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(resource)?)
}
