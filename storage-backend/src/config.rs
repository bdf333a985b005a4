use serde::{Deserialize, Serialize};
use shared_types::DEFAULT_NAMESPACE;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StorageError};

/// How often the resync loop rescans the backing medium unless configured otherwise.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageConfig {
    Local {
        path: PathBuf,
        resync_interval: Duration,
        /// Namespaces whose directories are prepared by `register()`.
        namespaces: Vec<String>,
    },
}

impl StorageConfig {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local {
            path: path.into(),
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            namespaces: vec![DEFAULT_NAMESPACE.to_string()],
        }
    }

    pub fn with_resync_interval(self, interval: Duration) -> Self {
        match self {
            Self::Local {
                path, namespaces, ..
            } => Self::Local {
                path,
                resync_interval: interval,
                namespaces,
            },
        }
    }

    pub fn with_namespaces<I, S>(self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            Self::Local {
                path,
                resync_interval,
                mut namespaces,
            } => {
                for namespace in extra {
                    let namespace = namespace.into();
                    if !namespaces.contains(&namespace) {
                        namespaces.push(namespace);
                    }
                }
                Self::Local {
                    path,
                    resync_interval,
                    namespaces,
                }
            }
        }
    }

    pub fn resync_interval(&self) -> Duration {
        match self {
            Self::Local {
                resync_interval, ..
            } => *resync_interval,
        }
    }

    pub fn from_env() -> Result<Self> {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string());

        match backend.as_str() {
            "local" => {
                let path = std::env::var("STORAGE_PATH").unwrap_or_else(|_| "./data".to_string());
                let interval = match std::env::var("STORAGE_RESYNC_INTERVAL_MS") {
                    Ok(raw) => parse_interval_ms(&raw)?,
                    Err(_) => DEFAULT_RESYNC_INTERVAL,
                };
                let namespaces = std::env::var("STORAGE_NAMESPACES").unwrap_or_default();

                Ok(Self::local(path)
                    .with_resync_interval(interval)
                    .with_namespaces(
                        namespaces
                            .split(',')
                            .map(str::trim)
                            .filter(|ns| !ns.is_empty()),
                    ))
            }
            other => Err(StorageError::Validation(format!(
                "Unknown storage backend: {other}. Must be 'local'"
            ))),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.resync_interval().is_zero() {
            return Err(StorageError::Validation(
                "resync interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_interval_ms(raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| {
            StorageError::Validation(format!("invalid STORAGE_RESYNC_INTERVAL_MS {raw:?}: {e}"))
        })
}
