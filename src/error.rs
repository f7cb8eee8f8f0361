//! Error types for Understudy

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Understudy operations
pub type Result<T> = std::result::Result<T, UnderstudyError>;

/// Errors that can occur in Understudy
#[derive(Debug, Error)]
pub enum UnderstudyError {
    /// A stub was called in a way no expectation allows
    #[error("Unexpected call: {call} ({reason})")]
    UnexpectedCall {
        /// Rendered call, method plus arguments
        call: String,
        /// Why nothing matched
        reason: String,
    },

    /// A stub expectation was not met at verification
    #[error("Unsatisfied expectation: {call} expected {expected}, called {actual} time(s)")]
    UnsatisfiedExpectation {
        /// Rendered call, method plus arguments
        call: String,
        /// Required call count
        expected: String,
        /// Actual call count
        actual: usize,
    },

    /// A stub expectation matched but has nothing to return
    #[error("Expectation for {call} has no return value")]
    MissingReturnValue {
        /// Rendered call, method plus arguments
        call: String,
    },

    /// No stored response matches the request fingerprint
    #[error("No recording for {method} {url} (fingerprint {fingerprint})")]
    RecordingNotFound {
        /// Fingerprint in hex
        fingerprint: String,
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },

    /// A recording could not be written
    #[error("Failed to persist recording to {}: {source}", path.display())]
    PersistenceFailure {
        /// Target path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Invalid recording file format
    #[error("Invalid recording format: {0}")]
    InvalidFormat(String),

    /// Recording body corrupted (CRC mismatch)
    #[error("Recording {fingerprint} corrupted: expected CRC {expected:#x}, got {actual:#x}")]
    CorruptedData {
        /// Fingerprint in hex
        fingerprint: String,
        /// Expected CRC32 value
        expected: u32,
        /// Actual CRC32 value
        actual: u32,
    },

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request/response too large
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// Response carried a non-success status
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },

    /// The live network call failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
