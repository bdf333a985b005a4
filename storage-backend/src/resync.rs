//! Poll-based change detection.
//!
//! The medium has no change feed, so a background task rescans every
//! registered kind on a fixed interval and diffs the result against the
//! previous scan. Detection latency is bounded by the interval.

use object_store::ObjectStore;
use shared_types::{Kind, ResourceKey};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::events::{EventSink, ResourceEvent, StoredResource};
use crate::layout;

pub(crate) type Snapshot = BTreeMap<ResourceKey, StoredResource>;

/// Reads the full live set of the registered kinds.
pub(crate) struct Scanner {
    store: Arc<dyn ObjectStore>,
    kinds: Vec<Kind>,
}

impl Scanner {
    pub(crate) fn new(store: Arc<dyn ObjectStore>, mut kinds: Vec<Kind>) -> Self {
        kinds.sort();
        kinds.dedup();
        Self { store, kinds }
    }

    /// Entries that cannot be read keep their previous state so they are
    /// neither reported as removed nor lost; they are retried next scan.
    pub(crate) async fn scan(&self, previous: &Snapshot) -> Snapshot {
        let mut current = Snapshot::new();

        for &kind in &self.kinds {
            if let Err(e) = self.scan_kind(kind, previous, &mut current).await {
                warn!("Resync of {} failed, keeping last observed state: {}", kind, e);
                current.retain(|key, _| key.kind != kind);
                current.extend(
                    previous
                        .iter()
                        .filter(|(key, _)| key.kind == kind)
                        .map(|(key, resource)| (key.clone(), resource.clone())),
                );
            }
        }

        current
    }

    async fn scan_kind(&self, kind: Kind, previous: &Snapshot, current: &mut Snapshot) -> Result<()> {
        let keys = layout::list_keys(&*self.store, kind, &layout::kind_prefix(kind)).await?;

        for key in keys {
            let read = layout::read_bytes(&*self.store, &key)
                .await
                .and_then(|bytes| bytes.map(|b| layout::decode_stored(&key, &b)).transpose());

            match read {
                Ok(Some(resource)) => {
                    current.insert(key, resource);
                }
                // Deleted between listing and reading.
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping unreadable resource {} until next resync: {}", key, e);
                    if let Some(last) = previous.get(&key) {
                        current.insert(key, last.clone());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Classifies every identity in either snapshot, ordered by key.
pub(crate) fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<ResourceEvent> {
    let mut events = Vec::new();

    for (key, resource) in current {
        match previous.get(key) {
            None => events.push(ResourceEvent::Added(resource.clone())),
            Some(last) if last.differs_from(resource) => events.push(ResourceEvent::Updated {
                previous: last.clone(),
                current: resource.clone(),
            }),
            Some(_) => {}
        }
    }

    for (key, resource) in previous {
        if !current.contains_key(key) {
            events.push(ResourceEvent::Removed(resource.clone()));
        }
    }

    events.sort_by(|a, b| a.key().cmp(b.key()));
    events
}

/// State shared between the facade and the background task.
pub(crate) struct Resync {
    scanner: Scanner,
    snapshot: Mutex<Snapshot>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    cancel: CancellationToken,
}

impl Resync {
    pub(crate) fn new(scanner: Scanner, cancel: CancellationToken) -> Self {
        Self {
            scanner,
            snapshot: Mutex::new(Snapshot::new()),
            sinks: RwLock::new(Vec::new()),
            cancel,
        }
    }

    /// Records the current state without notifying anyone.
    pub(crate) async fn baseline(&self) {
        let mut snapshot = self.snapshot.lock().await;
        let scanned = self.scanner.scan(&snapshot).await;
        *snapshot = scanned;
        debug!("Resync baseline holds {} resources", snapshot.len());
    }

    /// Scans once and notifies sinks of every change since the last scan.
    pub(crate) async fn run_once(&self) -> Vec<ResourceEvent> {
        let mut snapshot = self.snapshot.lock().await;
        let current = self.scanner.scan(&snapshot).await;
        let events = diff(&snapshot, &current);
        *snapshot = current;

        // Dispatch while still holding the snapshot so a subscriber seeded
        // from it cannot miss or double-apply an event.
        if !events.is_empty() && !self.cancel.is_cancelled() {
            debug!("Resync observed {} changes", events.len());
            self.dispatch(&events);
        }
        events
    }

    pub(crate) fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Runs `seed` against the last observed state and registers the sink it
    /// returns before any further scan can complete.
    pub(crate) async fn subscribe_seeded<S, F>(&self, seed: F) -> Arc<S>
    where
        S: EventSink + 'static,
        F: FnOnce(&Snapshot) -> S,
    {
        let snapshot = self.snapshot.lock().await;
        let sink = Arc::new(seed(&snapshot));
        self.subscribe(Arc::clone(&sink) as Arc<dyn EventSink>);
        sink
    }

    fn dispatch(&self, events: &[ResourceEvent]) {
        let sinks: Vec<Arc<dyn EventSink>> = {
            let mut sinks = self.sinks.write().unwrap_or_else(PoisonError::into_inner);
            sinks.retain(|sink| !sink.is_closed());
            sinks.clone()
        };

        for sink in &sinks {
            for event in events {
                if catch_unwind(AssertUnwindSafe(|| sink.notify(event))).is_err() {
                    error!("Event sink panicked while handling {}", event.key());
                }
            }
        }
    }
}

/// Starts the background loop. The first scan happens one interval after
/// start; the baseline is expected to be taken beforehand.
pub(crate) fn spawn(resync: Arc<Resync>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Resync loop started with interval {:?}", interval);

        loop {
            tokio::select! {
                () = resync.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    resync.run_once().await;
                }
            }
        }

        debug!("Resync loop stopped");
    })
}
