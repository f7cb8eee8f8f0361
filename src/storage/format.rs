//! On-disk recording format

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::config::RedactionConfig;
use crate::fingerprint::Fingerprint;
use crate::http::{Request, Response};
use crate::{Result, UnderstudyError};

/// Current recording format version
pub const FORMAT_VERSION: u32 = 2;

/// Replacement written in place of redacted values
pub const REDACTED: &str = "[REDACTED]";

/// One captured request/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// Format version
    pub version: u32,
    /// Request fingerprint in hex
    pub fingerprint: String,
    /// Capture time (Unix epoch milliseconds)
    pub recorded_at: u64,
    /// Request as sent
    pub request: RecordedRequest,
    /// Response as received
    pub response: RecordedResponse,
}

/// Stored request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Request body
    #[serde(default)]
    pub body: StoredBody,
}

/// Stored response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, values encoded like bodies
    #[serde(default)]
    pub headers: Vec<(String, StoredBody)>,
    /// Response body
    #[serde(default)]
    pub body: StoredBody,
    /// CRC32 of the raw body bytes
    pub body_crc32: u32,
}

/// Body bytes kept readable when they are text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "lowercase")]
pub enum StoredBody {
    /// UTF-8 text stored as-is
    Text(String),
    /// Arbitrary bytes stored as hex
    Hex(String),
}

impl Default for StoredBody {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl StoredBody {
    /// Encode raw bytes
    #[must_use]
    pub fn encode(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Hex(hex::encode(bytes)),
        }
    }

    /// Decode back into raw bytes
    ///
    /// # Errors
    ///
    /// Returns error if hex data is malformed
    pub fn decode(&self) -> Result<Bytes> {
        match self {
            Self::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Self::Hex(data) => hex::decode(data)
                .map(Bytes::from)
                .map_err(|e| UnderstudyError::InvalidFormat(format!("Bad hex body: {e}"))),
        }
    }
}

impl Recording {
    /// Capture an interaction, applying redaction to the stored request
    #[must_use]
    pub fn capture(
        fingerprint: Fingerprint,
        request: &Request,
        response: &Response,
        redaction: &RedactionConfig,
    ) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let headers = request
            .headers
            .iter()
            .map(|(name, value)| {
                let value = if redaction.redacts_header(name) {
                    REDACTED.to_string()
                } else {
                    redaction.scrub(value)
                };
                (name.clone(), value)
            })
            .collect();

        Self {
            version: FORMAT_VERSION,
            fingerprint: fingerprint.to_hex(),
            recorded_at,
            request: RecordedRequest {
                method: request.method.clone(),
                url: redaction.scrub(&request.url),
                headers,
                body: StoredBody::encode(&request.body),
            },
            response: RecordedResponse {
                status: response.status,
                headers: response
                    .headers
                    .iter()
                    .map(|(name, value)| (name.clone(), StoredBody::encode(value)))
                    .collect(),
                body: StoredBody::encode(&response.body),
                body_crc32: crc32(&response.body),
            },
        }
    }

    /// Decode and checksum the stored response
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be decoded or its CRC does not match
    pub fn to_response(&self) -> Result<Response> {
        let body = self.response.body.decode()?;
        let actual = crc32(&body);
        if actual != self.response.body_crc32 {
            return Err(UnderstudyError::CorruptedData {
                fingerprint: self.fingerprint.clone(),
                expected: self.response.body_crc32,
                actual,
            });
        }

        let headers = self
            .response
            .headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), value.decode()?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Response {
            status: self.response.status,
            headers,
            body,
        })
    }

    /// Check version and fingerprint fields
    ///
    /// # Errors
    ///
    /// Returns error if the version is unsupported or fingerprint malformed
    pub fn validate(&self) -> Result<Fingerprint> {
        if self.version != FORMAT_VERSION {
            return Err(UnderstudyError::InvalidFormat(format!(
                "Unsupported version: {}, expected {}",
                self.version, FORMAT_VERSION
            )));
        }
        self.fingerprint.parse()
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
