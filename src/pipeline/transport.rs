//! HTTP transport: one GET per call, no retry logic.
//!
//! The fetcher and page pipeline only see the [`Transport`] and
//! [`TransportFactory`] traits. The page pipeline holds a transport handle and
//! swaps it for a fresh one from the factory after a timeout, which is how a
//! stuck connection pool gets discarded. Tests plug in scripted transports.

use crate::config::DownloadConfig;
use crate::error::{TransportError, TransportErrorKind};
use crate::model::CookieJar;
use async_trait::async_trait;
use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A fully prepared GET request.
///
/// Built once per page and sent unchanged on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub user_agent: String,
    pub referer: Option<String>,
    pub cookie_header: Option<String>,
}

impl PageRequest {
    /// Request for a page image: user agent, referer and session cookies.
    pub fn for_page(url: &str, config: &DownloadConfig, cookies: &CookieJar) -> Self {
        Self {
            url: url.to_string(),
            user_agent: config.user_agent.clone(),
            referer: config.referer.clone(),
            cookie_header: cookies.header_value(),
        }
    }

    /// Request for the episode index page. The index is fetched without a
    /// referer, like a browser navigation.
    pub fn for_index(url: &str, config: &DownloadConfig, cookies: &CookieJar) -> Self {
        Self {
            referer: None,
            ..Self::for_page(url, config, cookies)
        }
    }
}

/// Sends a single GET and returns the response body.
///
/// Implementations must report a non-success HTTP status as
/// [`TransportErrorKind::Status`] and a deadline hit as
/// [`TransportErrorKind::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &PageRequest) -> Result<Vec<u8>, TransportError>;
}

/// Builds fresh transports, each with a new timeout budget and connection pool.
pub trait TransportFactory: Send + Sync {
    fn build(&self) -> Result<Arc<dyn Transport>, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::new(TransportErrorKind::Request, e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: &PageRequest) -> Result<Vec<u8>, TransportError> {
        let mut builder = self
            .client
            .get(&request.url)
            .header(USER_AGENT, &request.user_agent);
        if let Some(ref referer) = request.referer {
            builder = builder.header(REFERER, referer);
        }
        if let Some(ref cookie) = request.cookie_header {
            builder = builder.header(COOKIE, cookie);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportErrorKind::Status(status.as_u16()),
                format!("HTTP {} for '{}'", status, request.url),
            ));
        }

        let bytes = response.bytes().await?;
        debug!("GET {} → {} bytes", request.url, bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Factory producing [`ReqwestTransport`]s with the configured timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransportFactory {
    timeout: Duration,
}

impl ReqwestTransportFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(config.request_timeout())
    }
}

impl TransportFactory for ReqwestTransportFactory {
    fn build(&self) -> Result<Arc<dyn Transport>, TransportError> {
        debug!("Building HTTP client with {:?} timeout", self.timeout);
        Ok(Arc::new(ReqwestTransport::new(self.timeout)?))
    }
}
