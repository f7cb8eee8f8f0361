//! Request and response values passed through transports

use bytes::Bytes;

use crate::transport::Transport;
use crate::{Result, UnderstudyError};

/// Outgoing HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method (e.g., "GET", "POST")
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Request headers, in send order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Bytes,
}

impl Request {
    /// Create a request with no headers and an empty body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// `GET url`
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// `POST url`
    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    /// Append a header
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Send this request through `transport`
    ///
    /// # Errors
    ///
    /// Returns whatever error the transport produces
    pub async fn fetch<T: Transport>(&self, transport: &T) -> Result<Response> {
        transport.round_trip(self).await
    }
}

/// HTTP response returned by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers, values exactly as received
    pub headers: Vec<(String, Bytes)>,
    /// Response body
    pub body: Bytes,
}

impl Response {
    /// First header with `name` as text, compared case-insensitively
    ///
    /// `None` if the header is missing or its value is not UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_bytes(name)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    /// Raw value of the first header with `name`
    pub fn header_bytes(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| &v[..])
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8 text
    ///
    /// # Errors
    ///
    /// Returns error if the body is not valid UTF-8
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| UnderstudyError::InvalidFormat(format!("Body is not UTF-8: {e}")))
    }

    /// Turn a non-2xx response into an error
    ///
    /// # Errors
    ///
    /// Returns [`UnderstudyError::UnexpectedStatus`] unless the status is 2xx
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(UnderstudyError::UnexpectedStatus {
                status: self.status,
                url: url.to_string(),
            })
        }
    }
}
