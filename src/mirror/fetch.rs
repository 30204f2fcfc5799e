//! Fetch capability consumed by both pipeline phases.
//!
//! The coordinators only ever see the [Fetcher] trait; the HTTP client,
//! browser-shaped headers and challenge handling all live behind it, so the
//! pipeline stays correct against an in-memory fake.

use std::io::Read;
use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use thiserror::Error;

/// Document fetches sit behind anti-automation checks and may be slow to serve.
pub(crate) const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(45);

/// Payload fetches are plain static files; a stalled chunk should fail fast.
pub(crate) const STREAM_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const ACCEPT_DOCUMENT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
                               image/avif,image/webp,image/apng,*/*;q=0.8";

/// Error classes surfaced per fetch. The coordinators treat every class the
/// same (the task contributes nothing); the classes exist so the log carries
/// enough context for a manual retry.
#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("transient network failure: {0}")]
    TransientNetwork(String),
    #[error("request timed out")]
    Timeout,
    #[error("anti-automation challenge was not passed")]
    Challenge,
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("unexpected fetch failure: {0}")]
    Unexpected(String),
}

/// Transport capability for both phases: whole documents for discovery,
/// chunked byte streams for retrieval.
pub(crate) trait Fetcher: Sync {
    fn fetch_document(&self, url: &str, headers: &[(String, String)]) -> Result<String, FetchError>;

    fn fetch_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Box<dyn Read>, FetchError>;
}

/// [Fetcher] backed by a blocking HTTP client pair, one per timeout profile.
pub(crate) struct HttpFetcher {
    document_client: Client,
    stream_client: Client,
}

impl HttpFetcher {
    pub(crate) fn new() -> Result<Self, anyhow::Error> {
        let mut base_headers = HeaderMap::new();
        base_headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_DOCUMENT));
        base_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let document_client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(base_headers.clone())
            .timeout(DOCUMENT_TIMEOUT)
            .gzip(true)
            .build()
            .context("Failed to build document HTTP client")?;

        let stream_client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(base_headers)
            .timeout(STREAM_TIMEOUT)
            .gzip(true)
            .build()
            .context("Failed to build payload HTTP client")?;

        Ok(HttpFetcher {
            document_client,
            stream_client,
        })
    }

    fn send(builder: RequestBuilder, headers: &[(String, String)]) -> Result<Response, FetchError> {
        let mut builder = builder;
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(Self::classify)?;
        Self::check_status(response.status())?;
        Ok(response)
    }

    fn classify(error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout
        } else if error.is_connect() || error.is_request() {
            FetchError::TransientNetwork(error.to_string())
        } else {
            FetchError::Unexpected(error.to_string())
        }
    }

    /// 403 and 503 are the statuses a failed challenge surfaces as; they must
    /// never be silently substituted with whatever body came back.
    fn check_status(status: StatusCode) -> Result<(), FetchError> {
        if status.is_success() {
            Ok(())
        } else if matches!(
            status,
            StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE
        ) {
            Err(FetchError::Challenge)
        } else if status.is_server_error() {
            Err(FetchError::TransientNetwork(format!(
                "server returned {status}"
            )))
        } else {
            Err(FetchError::HttpStatus(status.as_u16()))
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_document(&self, url: &str, headers: &[(String, String)]) -> Result<String, FetchError> {
        let response = Self::send(self.document_client.get(url), headers)?;
        response.text().map_err(Self::classify)
    }

    fn fetch_stream(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Box<dyn Read>, FetchError> {
        let response = Self::send(self.stream_client.get(url), headers)?;
        Ok(Box::new(response))
    }
}
