// ABOUTME: Patient bundle cache configuration and re-exports
// ABOUTME: In-memory LRU store with per-entry TTL and optional background cleanup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// In-memory patient bundle cache
pub mod memory;

use std::time::Duration;

use fhir_connector_core::constants::cache::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CLEANUP_INTERVAL_SECS,
};

pub use memory::PatientCache;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached bundles before LRU eviction
    pub max_entries: usize,
    /// How often the cleanup task sweeps expired entries
    pub cleanup_interval: Duration,
    /// Spawn the background cleanup task (requires a tokio runtime)
    pub enable_background_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: false,
        }
    }
}
