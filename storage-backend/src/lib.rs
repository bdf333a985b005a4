#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cache;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod events;
mod layout;
mod lock;
pub mod registry;
mod resync;
pub mod traits;

#[cfg(test)]
mod tests;

pub use cache::ResourceCache;
pub use client::{FileStorage, V1};
pub use collection::FileCollection;
pub use config::{DEFAULT_RESYNC_INTERVAL, StorageConfig};
pub use error::{Result, StorageError};
pub use events::{EventSink, ResourceEvent, StoredResource};
pub use registry::KindRegistry;
pub use traits::ResourceClient;
