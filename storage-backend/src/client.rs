use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use shared_types::{Kind, ResolverMap, Role, Schema, Upstream, VirtualService};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{error, info};

use crate::cache::ResourceCache;
use crate::collection::FileCollection;
use crate::config::StorageConfig;
use crate::error::Result;
use crate::events::{EventSink, ResourceEvent};
use crate::lock::KeyLocks;
use crate::registry::KindRegistry;
use crate::resync::{self, Resync, Scanner};

/// Version 1 of the resource API: registration plus one collection per kind.
pub struct V1 {
    registry: KindRegistry,
    upstreams: FileCollection<Upstream>,
    virtual_services: FileCollection<VirtualService>,
    roles: FileCollection<Role>,
    schemas: FileCollection<Schema>,
    resolver_maps: FileCollection<ResolverMap>,
}

impl V1 {
    fn new(store: &Arc<dyn ObjectStore>, registry: KindRegistry) -> Self {
        let locks = KeyLocks::new();
        Self {
            registry,
            upstreams: FileCollection::new(Arc::clone(store), locks.clone()),
            virtual_services: FileCollection::new(Arc::clone(store), locks.clone()),
            roles: FileCollection::new(Arc::clone(store), locks.clone()),
            schemas: FileCollection::new(Arc::clone(store), locks.clone()),
            resolver_maps: FileCollection::new(Arc::clone(store), locks),
        }
    }

    /// Prepares the backing location of every kind. Idempotent.
    pub async fn register(&self) -> Result<()> {
        self.registry.register().await
    }

    pub fn kinds(&self) -> &[Kind] {
        self.registry.kinds()
    }

    pub fn upstreams(&self) -> &FileCollection<Upstream> {
        &self.upstreams
    }

    pub fn virtual_services(&self) -> &FileCollection<VirtualService> {
        &self.virtual_services
    }

    pub fn roles(&self) -> &FileCollection<Role> {
        &self.roles
    }

    pub fn schemas(&self) -> &FileCollection<Schema> {
        &self.schemas
    }

    pub fn resolver_maps(&self) -> &FileCollection<ResolverMap> {
        &self.resolver_maps
    }
}

/// Entry point to a directory-backed resource store.
///
/// Owns the resync task: it starts on construction and stops on
/// [`FileStorage::shutdown`] or when the storage is dropped.
pub struct FileStorage {
    v1: V1,
    resync: Arc<Resync>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    _stop_on_drop: DropGuard,
}

impl FileStorage {
    pub async fn from_config(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let resync_interval = config.resync_interval();
        let StorageConfig::Local {
            path, namespaces, ..
        } = config;

        info!("Initializing local storage at: {:?}", path);
        tokio::fs::create_dir_all(&path).await?;
        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(&path)?);

        let kinds = Kind::ALL.to_vec();
        let registry = KindRegistry::new(path, kinds.clone(), namespaces);
        let v1 = V1::new(&store, registry);

        let cancel = CancellationToken::new();
        let resync = Arc::new(Resync::new(Scanner::new(store, kinds), cancel.clone()));
        resync.baseline().await;
        let task = resync::spawn(Arc::clone(&resync), resync_interval);

        Ok(Self {
            v1,
            resync,
            _stop_on_drop: cancel.clone().drop_guard(),
            cancel,
            task: Some(task),
        })
    }

    pub fn v1(&self) -> &V1 {
        &self.v1
    }

    /// Registers a sink for every change observed by subsequent scans.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.resync.subscribe(sink);
    }

    /// Channel fed with every change observed by subsequent scans.
    pub fn watch(&self) -> UnboundedReceiver<ResourceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.resync.subscribe(Arc::new(tx));
        rx
    }

    /// A cache seeded from the last scan and kept current by later ones.
    pub async fn cache(&self) -> Arc<ResourceCache> {
        self.resync
            .subscribe_seeded(|snapshot| ResourceCache::seeded(snapshot.values().cloned()))
            .await
    }

    /// Scans immediately instead of waiting for the next tick and returns the
    /// changes that were reported.
    pub async fn resync(&self) -> Vec<ResourceEvent> {
        self.resync.run_once().await
    }

    /// Stops the resync loop. Once this returns no further notifications
    /// are delivered.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Resync task ended abnormally: {}", e);
            }
            info!("Storage shut down");
        }
    }
}
