//! Fingerprint-keyed cache of inferred selector sets.
//!
//! Entries are keyed by [`DomSnapshot::fingerprint`](crate::snapshot::DomSnapshot::fingerprint),
//! so a page whose skeleton is unchanged can skip the inference backend. An
//! entry is removed as soon as it fails validation against a new snapshot.
//!
//! The cache can be persisted as a JSON file between runs. Stored sets are
//! never trusted: the validated flag is not serialized, so every hit goes
//! through the validator again.

use crate::models::SelectorSet;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// One cached selector set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub selectors: SelectorSet,
    pub stored_at: DateTime<Utc>,
}

/// Concurrent in-memory selector cache.
#[derive(Debug, Default)]
pub struct SelectorCache {
    entries: DashMap<String, CachedEntry>,
}

impl SelectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a cache file; a missing file yields an empty cache.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No selector cache file yet; starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let stored: BTreeMap<String, CachedEntry> = serde_json::from_str(&raw)?;
        info!(entries = stored.len(), "Loaded selector cache");
        Ok(Self {
            entries: stored.into_iter().collect(),
        })
    }

    /// Write the cache to `path` as pretty JSON, sorted by fingerprint.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn Error>> {
        let stored: BTreeMap<String, CachedEntry> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let json = serde_json::to_string_pretty(&stored)?;
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path.as_ref(), json).await?;
        info!(entries = stored.len(), "Saved selector cache");
        Ok(())
    }

    pub fn get(&self, fingerprint: &str) -> Option<SelectorSet> {
        self.entries.get(fingerprint).map(|e| e.selectors.clone())
    }

    pub fn insert(&self, fingerprint: impl Into<String>, selectors: SelectorSet) {
        let fingerprint = fingerprint.into();
        debug!(%fingerprint, "Caching selector set");
        self.entries.insert(
            fingerprint,
            CachedEntry {
                selectors,
                stored_at: Utc::now(),
            },
        );
    }

    pub fn invalidate(&self, fingerprint: &str) {
        if self.entries.remove(fingerprint).is_some() {
            warn!(%fingerprint, "Invalidated cached selector set");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
