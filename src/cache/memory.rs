// ABOUTME: In-memory patient bundle cache with LRU eviction and per-entry TTL
// ABOUTME: Expired entries are evicted lazily on access and by an optional cleanup task
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use fhir_connector_core::PatientBundle;
use lru::LruCache;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::debug;

use super::CacheConfig;

type Store = Arc<RwLock<LruCache<String, CacheEntry>>>;

#[derive(Debug, Clone)]
struct CacheEntry {
    bundle: Arc<PatientBundle>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(bundle: Arc<PatientBundle>, ttl: Option<Duration>) -> Self {
        Self {
            bundle,
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Patient bundle cache keyed by patient id
///
/// Clones share the same store. Reads take the write lock because an LRU hit
/// updates recency.
#[derive(Clone)]
pub struct PatientCache {
    store: Store,
    shutdown_tx: Option<Arc<mpsc::Sender<()>>>,
}

impl PatientCache {
    const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(n) => n,
        None => unreachable!(),
    };

    /// Create a cache, spawning the cleanup task when enabled
    ///
    /// Enabling background cleanup requires a running tokio runtime.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(Self::DEFAULT_CAPACITY);
        let store: Store = Arc::new(RwLock::new(LruCache::new(capacity)));

        let shutdown_tx = config.enable_background_cleanup.then(|| {
            let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
            let task_store = Arc::clone(&store);
            let cleanup_interval = config.cleanup_interval;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cleanup_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            Self::cleanup_expired(&task_store).await;
                        }
                        _ = shutdown_rx.recv() => {
                            debug!("Patient cache cleanup task received shutdown signal");
                            break;
                        }
                    }
                }
            });

            Arc::new(shutdown_tx)
        });

        Self { store, shutdown_tx }
    }

    async fn cleanup_expired(store: &Store) -> usize {
        let mut guard = store.write().await;
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            guard.pop(key);
        }
        drop(guard);

        if !expired.is_empty() {
            debug!(removed = expired.len(), "Cleaned up expired patient bundles");
        }
        expired.len()
    }

    /// Cached bundle for `patient_id` if present and unexpired
    ///
    /// An expired entry is evicted on the way out.
    pub async fn get(&self, patient_id: &str) -> Option<Arc<PatientBundle>> {
        let mut store = self.store.write().await;
        let entry = store.get(patient_id)?;
        if entry.is_expired() {
            store.pop(patient_id);
            drop(store);
            debug!(patient_id, "Evicted expired patient bundle");
            return None;
        }
        let bundle = Arc::clone(&entry.bundle);
        drop(store);
        Some(bundle)
    }

    /// Store a bundle; `None` means it never expires
    pub async fn put(
        &self,
        patient_id: impl Into<String>,
        bundle: Arc<PatientBundle>,
        ttl: Option<Duration>,
    ) {
        let entry = CacheEntry::new(bundle, ttl);
        self.store.write().await.push(patient_id.into(), entry);
    }

    /// Remove one entry, or every entry when `patient_id` is `None`
    pub async fn invalidate(&self, patient_id: Option<&str>) {
        let mut store = self.store.write().await;
        match patient_id {
            Some(id) => {
                store.pop(id);
            }
            None => store.clear(),
        }
    }

    /// Sweep expired entries now, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        Self::cleanup_expired(&self.store).await
    }

    /// Remaining lifetime of an entry
    ///
    /// `None` when absent, expired, or stored without expiry. Does not touch
    /// LRU order.
    pub async fn ttl(&self, patient_id: &str) -> Option<Duration> {
        let store = self.store.read().await;
        let expires_at = store.peek(patient_id)?.expires_at?;
        expires_at.checked_duration_since(Instant::now())
    }

    /// Number of stored entries, expired ones included until evicted
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

impl fmt::Debug for PatientCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatientCache")
            .field("background_cleanup", &self.shutdown_tx.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for PatientCache {
    fn drop(&mut self) {
        // Only the last clone stops the cleanup task
        if let Some(tx) = self.shutdown_tx.take() {
            if Arc::strong_count(&tx) == 1 {
                if let Err(e) = tx.try_send(()) {
                    debug!(error = ?e, "Patient cache shutdown signal not delivered");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use fhir_connector_core::Patient;

    use super::*;

    fn bundle(id: &str) -> Arc<PatientBundle> {
        Arc::new(PatientBundle {
            patient: Patient {
                id: Some(id.to_owned()),
                ..Patient::default()
            },
            conditions: Vec::new(),
            medications: Vec::new(),
            observations: Vec::new(),
            encounters: Vec::new(),
            fetched_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_lru_capacity_evicts_oldest() {
        let cache = PatientCache::new(&CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        });
        cache.put("a", bundle("a"), None).await;
        cache.put("b", bundle("b"), None).await;
        assert!(cache.get("a").await.is_some());
        cache.put("c", bundle("c"), None).await;

        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_no_ttl_has_no_remaining_lifetime() {
        let cache = PatientCache::new(&CacheConfig::default());
        cache.put("p", bundle("p"), None).await;
        assert!(cache.ttl("p").await.is_none());
        assert!(cache.get("p").await.is_some());
    }
}
