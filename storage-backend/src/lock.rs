use dashmap::DashMap;
use shared_types::ResourceKey;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per resource identity, created on demand.
///
/// Entries are dropped again once no task holds or waits on them, so the map
/// only tracks identities with mutations in flight.
#[derive(Clone, Default)]
pub(crate) struct KeyLocks {
    locks: Arc<DashMap<ResourceKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, key: &ResourceKey) -> KeyGuard {
        // The shard lock must not be held across the await below.
        let lock = self.locks.entry(key.clone()).or_default().value().clone();
        let guard = lock.lock_owned().await;

        KeyGuard {
            guard: Some(guard),
            key: key.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.len()
    }
}

/// Held for the duration of a mutation; releases on every exit path.
pub(crate) struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: ResourceKey,
    locks: Arc<DashMap<ResourceKey, Arc<Mutex<()>>>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
