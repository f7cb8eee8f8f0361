//! Replay mode: serve stored responses, never the network

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::Transport;
use crate::fingerprint::{fingerprint, Fingerprint, FingerprintPolicy};
use crate::http::{Request, Response};
use crate::storage::RecordingStore;
use crate::{Result, UnderstudyError};

/// Transport that answers every request from recordings
///
/// Holds no network client. Responses are loaded from the store on first
/// use and cached by fingerprint.
pub struct ReplayTransport {
    store: RecordingStore,
    policy: FingerprintPolicy,
    cache: DashMap<Fingerprint, Response>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ReplayTransport {
    /// Replay from `source`, which must already exist
    ///
    /// # Errors
    ///
    /// Returns error if `source` is not a directory
    pub fn new(source: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_store(RecordingStore::open_existing(source)?))
    }

    /// Replay from an already opened store
    pub fn with_store(store: RecordingStore) -> Self {
        Self {
            store,
            policy: FingerprintPolicy::default(),
            cache: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Use `policy` to fingerprint requests
    #[must_use]
    pub fn with_policy(mut self, policy: FingerprintPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Backing store
    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    /// Load every recording in the store into the cache
    ///
    /// # Errors
    ///
    /// Returns error if any recording cannot be read or is corrupted
    pub fn warm(&self) -> Result<usize> {
        let fingerprints = self.store.list()?;
        let mut loaded = 0;
        for fingerprint in fingerprints {
            if let Some(recording) = self.store.load(&fingerprint)? {
                self.cache.insert(fingerprint, recording.to_response()?);
                loaded += 1;
            }
        }
        info!("Warmed replay cache with {} recording(s)", loaded);
        Ok(loaded)
    }

    /// Stored response for `fingerprint`, if any
    ///
    /// Updates hit/miss counters.
    ///
    /// # Errors
    ///
    /// Returns error if a recording exists but cannot be decoded
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Result<Option<Response>> {
        if let Some(response) = self.cache.get(fingerprint) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(response.clone()));
        }

        let Some(recording) = self.store.load(fingerprint)? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let response = recording.to_response()?;
        self.cache.insert(*fingerprint, response.clone());
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(response))
    }

    /// Hit/miss statistics
    pub fn stats(&self) -> ReplayStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        ReplayStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            cached: self.cache.len(),
        }
    }

    /// Drop cached responses and reset counters
    pub fn clear_cache(&self) {
        info!("Clearing replay cache");
        self.cache.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Transport for ReplayTransport {
    async fn round_trip(&self, request: &Request) -> Result<Response> {
        let fingerprint = fingerprint(request, &self.policy)?;

        if let Some(response) = self.lookup(&fingerprint)? {
            debug!(
                "Replay hit: {} {} -> {} ({})",
                request.method,
                request.url,
                response.status,
                fingerprint.short()
            );
            Ok(response)
        } else {
            warn!(
                "Replay miss: {} {} ({})",
                request.method,
                request.url,
                fingerprint.short()
            );
            Err(UnderstudyError::RecordingNotFound {
                fingerprint: fingerprint.to_hex(),
                method: request.method.clone(),
                url: request.url.clone(),
            })
        }
    }
}

/// Replay statistics
#[derive(Debug, Clone, Copy)]
pub struct ReplayStats {
    /// Requests answered from recordings
    pub hits: usize,
    /// Requests with no recording
    pub misses: usize,
    /// Hit rate (0.0 to 1.0)
    pub hit_rate: f64,
    /// Responses held in memory
    pub cached: usize,
}
