//! Record mode: pass through and persist

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use super::Transport;
use crate::config::RedactionConfig;
use crate::fingerprint::{fingerprint, Fingerprint, FingerprintPolicy};
use crate::http::{Request, Response};
use crate::storage::{Recording, RecordingStore};
use crate::{Result, UnderstudyError};

/// Transport that performs real calls through `T` and saves each
/// request/response pair before returning it
pub struct RecordingTransport<T> {
    inner: T,
    store: RecordingStore,
    policy: FingerprintPolicy,
    redaction: RedactionConfig,
    max_body_size: usize,
    recorded: AtomicUsize,
}

impl<T: Transport> RecordingTransport<T> {
    /// Record through `inner` into `destination`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the destination directory cannot be created
    pub fn new(inner: T, destination: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_store(inner, RecordingStore::open(destination)?))
    }

    /// Record through `inner` into an already opened store
    pub fn with_store(inner: T, store: RecordingStore) -> Self {
        Self {
            inner,
            store,
            policy: FingerprintPolicy::default(),
            redaction: RedactionConfig::default(),
            max_body_size: usize::MAX,
            recorded: AtomicUsize::new(0),
        }
    }

    /// Use `policy` to fingerprint requests
    #[must_use]
    pub fn with_policy(mut self, policy: FingerprintPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use `redaction` when writing requests
    #[must_use]
    pub fn with_redaction(mut self, redaction: RedactionConfig) -> Self {
        self.redaction = redaction;
        self
    }

    /// Refuse to store response bodies larger than `limit`
    #[must_use]
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    /// Backing store
    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    /// Fingerprinting policy
    pub fn policy(&self) -> &FingerprintPolicy {
        &self.policy
    }

    /// Interactions recorded so far
    pub fn recorded_count(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Unwrap the inner transport
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Perform the live call and persist it under `fingerprint`
    pub(crate) async fn record(&self, fingerprint: Fingerprint, request: &Request) -> Result<Response> {
        let response = self.inner.round_trip(request).await?;

        if response.body.len() > self.max_body_size {
            return Err(UnderstudyError::DataTooLarge {
                size: response.body.len(),
                limit: self.max_body_size,
            });
        }

        let recording = Recording::capture(fingerprint, request, &response, &self.redaction);
        self.store.save(&recording)?;

        let count = self.recorded.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "Recorded {} {} -> {} ({}, count: {})",
            request.method,
            request.url,
            response.status,
            fingerprint.short(),
            count
        );

        Ok(response)
    }
}

impl<T: Transport> Transport for RecordingTransport<T> {
    async fn round_trip(&self, request: &Request) -> Result<Response> {
        let fingerprint = fingerprint(request, &self.policy)?;
        self.record(fingerprint, request).await
    }
}
