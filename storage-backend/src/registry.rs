use shared_types::Kind;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::layout;

/// The kinds one store instance manages and where each one lives.
#[derive(Debug, Clone)]
pub struct KindRegistry {
    root: PathBuf,
    kinds: Vec<Kind>,
    namespaces: Vec<String>,
}

impl KindRegistry {
    pub fn new(root: impl Into<PathBuf>, kinds: Vec<Kind>, namespaces: Vec<String>) -> Self {
        Self {
            root: root.into(),
            kinds,
            namespaces,
        }
    }

    pub fn kinds(&self) -> &[Kind] {
        &self.kinds
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn kind_dir(&self, kind: Kind, namespace: &str) -> PathBuf {
        self.root.join(kind.as_str()).join(namespace)
    }

    /// Ensures `<root>/<kind>/<namespace>/` exists for every managed kind and
    /// namespace. Safe to call repeatedly.
    pub async fn register(&self) -> Result<()> {
        for namespace in &self.namespaces {
            layout::validate_segment("namespace", namespace)?;
        }

        for &kind in &self.kinds {
            for namespace in &self.namespaces {
                let dir = self.kind_dir(kind, namespace);
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|source| StorageError::Registration {
                        path: dir.clone(),
                        source,
                    })?;
                debug!("Prepared {:?}", dir);
            }
        }

        info!(
            "Registered {} kinds in {} namespaces under {:?}",
            self.kinds.len(),
            self.namespaces.len(),
            self.root
        );
        Ok(())
    }
}
