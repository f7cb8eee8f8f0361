//! Auto mode: replay when possible, record otherwise

use std::path::PathBuf;

use tracing::debug;

use super::{RecordingTransport, ReplayTransport, Transport};
use crate::config::RedactionConfig;
use crate::fingerprint::{fingerprint, FingerprintPolicy};
use crate::http::{Request, Response};
use crate::storage::RecordingStore;
use crate::Result;

/// Transport that replays recorded requests and records the rest
pub struct CachingTransport<T> {
    recorder: RecordingTransport<T>,
    replayer: ReplayTransport,
}

impl<T: Transport> CachingTransport<T> {
    /// Cache responses from `inner` in `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(inner: T, dir: impl Into<PathBuf>) -> Result<Self> {
        let store = RecordingStore::open(dir)?;
        Ok(Self {
            recorder: RecordingTransport::with_store(inner, store.clone()),
            replayer: ReplayTransport::with_store(store),
        })
    }

    /// Use `policy` for both lookups and recordings
    #[must_use]
    pub fn with_policy(self, policy: FingerprintPolicy) -> Self {
        Self {
            recorder: self.recorder.with_policy(policy.clone()),
            replayer: self.replayer.with_policy(policy),
        }
    }

    /// Use `redaction` when writing new recordings
    #[must_use]
    pub fn with_redaction(mut self, redaction: RedactionConfig) -> Self {
        self.recorder = self.recorder.with_redaction(redaction);
        self
    }

    /// Refuse to store response bodies larger than `limit`
    #[must_use]
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.recorder = self.recorder.with_max_body_size(limit);
        self
    }

    /// Recording half
    pub fn recorder(&self) -> &RecordingTransport<T> {
        &self.recorder
    }

    /// Replay half
    pub fn replayer(&self) -> &ReplayTransport {
        &self.replayer
    }
}

impl<T: Transport> Transport for CachingTransport<T> {
    async fn round_trip(&self, request: &Request) -> Result<Response> {
        let fingerprint = fingerprint(request, self.recorder.policy())?;

        if let Some(response) = self.replayer.lookup(&fingerprint)? {
            debug!("Cached: {} {} ({})", request.method, request.url, fingerprint.short());
            return Ok(response);
        }

        self.recorder.record(fingerprint, request).await
    }
}
