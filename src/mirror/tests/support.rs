//! In-memory fakes for the fetch and extractor capabilities.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::mirror::extract::{Extractor, MediaKind, MediaReference};
use crate::mirror::fetch::{FetchError, Fetcher};

/// Serves canned documents and payloads, optionally failing or delaying
/// specific URLs. Every stream fetch is appended to `stream_log` so tests can
/// assert batch sequencing.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    documents: HashMap<String, String>,
    payloads: HashMap<String, Vec<u8>>,
    failures: HashSet<String>,
    latencies: HashMap<String, Duration>,
    stream_log: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        FakeFetcher::default()
    }

    pub(crate) fn with_document(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(url.to_string(), body.to_string());
        self
    }

    pub(crate) fn with_payload(mut self, url: &str, bytes: &[u8]) -> Self {
        self.payloads.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub(crate) fn with_failure(mut self, url: &str) -> Self {
        self.failures.insert(url.to_string());
        self
    }

    pub(crate) fn with_latency(mut self, url: &str, latency: Duration) -> Self {
        self.latencies.insert(url.to_string(), latency);
        self
    }

    pub(crate) fn streamed_urls(&self) -> Vec<String> {
        self.stream_log.lock().unwrap().clone()
    }

    fn check(&self, url: &str) -> Result<(), FetchError> {
        if let Some(latency) = self.latencies.get(url) {
            thread::sleep(*latency);
        }
        if self.failures.contains(url) {
            return Err(FetchError::TransientNetwork(format!(
                "injected fault for {url}"
            )));
        }
        Ok(())
    }
}

impl Fetcher for FakeFetcher {
    fn fetch_document(
        &self,
        url: &str,
        _headers: &[(String, String)],
    ) -> Result<String, FetchError> {
        self.check(url)?;
        self.documents
            .get(url)
            .cloned()
            .ok_or(FetchError::HttpStatus(404))
    }

    fn fetch_stream(
        &self,
        url: &str,
        _headers: &[(String, String)],
    ) -> Result<Box<dyn Read>, FetchError> {
        self.stream_log.lock().unwrap().push(url.to_string());
        self.check(url)?;
        let bytes = self
            .payloads
            .get(url)
            .cloned()
            .ok_or(FetchError::HttpStatus(404))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

/// Returns a canned reference for configured index units, ignoring the
/// document body.
#[derive(Default)]
pub(crate) struct FakeExtractor {
    hits: HashMap<u64, String>,
}

impl FakeExtractor {
    pub(crate) fn new() -> Self {
        FakeExtractor::default()
    }

    pub(crate) fn with_hit(mut self, origin_index: u64, media_url: &str) -> Self {
        self.hits.insert(origin_index, media_url.to_string());
        self
    }
}

impl Extractor for FakeExtractor {
    fn extract(
        &self,
        _document: &str,
        origin_index: u64,
        document_url: &str,
    ) -> Option<MediaReference> {
        self.hits.get(&origin_index).map(|url| {
            MediaReference::new(
                url.clone(),
                MediaKind::Image,
                origin_index,
                document_url.to_string(),
            )
        })
    }
}
