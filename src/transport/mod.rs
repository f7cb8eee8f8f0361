//! Record/replay transports
//!
//! A [`Transport`] turns a [`Request`] into a [`Response`]. [`HttpTransport`]
//! goes to the network; [`RecordingTransport`] wraps another transport and
//! saves every exchange; [`ReplayTransport`] answers from those saved
//! exchanges and fails loudly on anything it has not seen.

mod caching;
mod http;
mod record;
mod replay;

use std::future::Future;
use std::path::PathBuf;

use crate::config::{Config, Mode};
use crate::http::{Request, Response};
use crate::Result;

pub use caching::CachingTransport;
pub use http::HttpTransport;
pub use record::RecordingTransport;
pub use replay::{ReplayStats, ReplayTransport};

/// Something that can carry a request and bring back a response
pub trait Transport: Send + Sync {
    /// Perform one request/response exchange
    fn round_trip(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Record every exchange made through `inner` into `destination`
///
/// # Errors
///
/// Returns error if the destination directory cannot be created
pub fn record<T: Transport>(inner: T, destination: impl Into<PathBuf>) -> Result<RecordingTransport<T>> {
    RecordingTransport::new(inner, destination)
}

/// Answer every request from recordings in `source`
///
/// # Errors
///
/// Returns error if `source` does not exist
pub fn replay(source: impl Into<PathBuf>) -> Result<ReplayTransport> {
    ReplayTransport::new(source)
}

/// Transport selected by [`Config::mode`], over live HTTP
pub enum ConfiguredTransport {
    /// Record through HTTP
    Record(RecordingTransport<HttpTransport>),
    /// Replay only
    Replay(ReplayTransport),
    /// Replay, falling back to recording through HTTP
    Auto(CachingTransport<HttpTransport>),
}

impl ConfiguredTransport {
    /// Build the transport described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the recording
    /// directory cannot be opened
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let transport = match config.mode {
            Mode::Record => Self::Record(
                RecordingTransport::new(
                    HttpTransport::with_limits(config.limits.clone()),
                    &config.recording_dir,
                )?
                .with_policy(config.fingerprint.clone())
                .with_redaction(config.redaction.clone())
                .with_max_body_size(config.limits.max_body_size),
            ),
            Mode::Replay => Self::Replay(
                ReplayTransport::new(&config.recording_dir)?.with_policy(config.fingerprint.clone()),
            ),
            Mode::Auto => Self::Auto(
                CachingTransport::new(
                    HttpTransport::with_limits(config.limits.clone()),
                    &config.recording_dir,
                )?
                .with_policy(config.fingerprint.clone())
                .with_redaction(config.redaction.clone())
                .with_max_body_size(config.limits.max_body_size),
            ),
        };

        Ok(transport)
    }

    /// Active mode
    pub fn mode(&self) -> Mode {
        match self {
            Self::Record(_) => Mode::Record,
            Self::Replay(_) => Mode::Replay,
            Self::Auto(_) => Mode::Auto,
        }
    }
}

impl Transport for ConfiguredTransport {
    async fn round_trip(&self, request: &Request) -> Result<Response> {
        match self {
            Self::Record(transport) => transport.round_trip(request).await,
            Self::Replay(transport) => transport.round_trip(request).await,
            Self::Auto(transport) => transport.round_trip(request).await,
        }
    }
}
