//! Live HTTP transport

use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use super::Transport;
use crate::config::LimitsConfig;
use crate::http::{Request, Response};
use crate::{Result, UnderstudyError};

/// Transport that performs real HTTP requests
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    limits: LimitsConfig,
}

impl HttpTransport {
    /// Create a transport with default limits
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(LimitsConfig::default())
    }

    /// Create a transport with explicit limits
    #[must_use]
    pub fn with_limits(limits: LimitsConfig) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self { client, limits }
    }

    fn build_request(request: &Request) -> Result<hyper::Request<Full<Bytes>>> {
        let uri = request
            .url
            .parse::<Uri>()
            .map_err(|e| UnderstudyError::InvalidUrl(format!("'{}': {e}", request.url)))?;

        let method = request.method.parse::<Method>().map_err(|e| {
            UnderstudyError::Transport(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;

        let mut builder = hyper::Request::builder().method(method).uri(uri);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder
            .body(Full::new(request.body.clone()))
            .map_err(|e| UnderstudyError::Transport(format!("Failed to build request: {e}")))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    async fn round_trip(&self, request: &Request) -> Result<Response> {
        let http_request = Self::build_request(request)?;
        debug!("Sending {} {}", request.method, request.url);

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Request failed: {e}");
            UnderstudyError::Transport(format!("Request to {} failed: {e}", request.url))
        })?;

        let header_count = response.headers().len();
        if header_count > self.limits.max_headers {
            return Err(UnderstudyError::Transport(format!(
                "Too many response headers: {header_count}"
            )));
        }

        let content_length = response
            .headers()
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(size) = content_length.filter(|&size| size > self.limits.max_body_size) {
            return Err(UnderstudyError::DataTooLarge {
                size,
                limit: self.limits.max_body_size,
            });
        }

        let status = response.status().as_u16();
        let headers: Vec<(String, Bytes)> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.to_string(), Bytes::copy_from_slice(value.as_bytes())))
            .collect();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| UnderstudyError::Transport(format!("Failed to read response body: {e}")))?
            .to_bytes();

        if body.len() > self.limits.max_body_size {
            return Err(UnderstudyError::DataTooLarge {
                size: body.len(),
                limit: self.limits.max_body_size,
            });
        }

        debug!("{} {} -> {}", request.method, request.url, status);
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
