//! Persistent storage for recordings

mod format;
mod store;

pub use format::{
    RecordedRequest, RecordedResponse, Recording, StoredBody, FORMAT_VERSION, REDACTED,
};
pub use store::RecordingStore;

/// File extension of recording files
pub const RECORDING_EXTENSION: &str = "json";
