//! Phase 1: bounded-concurrency discovery of media references across the
//! index range.
//!
//! Every index unit becomes one task on a rayon pool. A task fetches its
//! page, runs the extractor, and writes the result into its own slot; the
//! coordinator merges the slots single-threaded after the pool barrier and
//! sorts by origin index, so completion order never leaks into processing
//! order. A failing page logs and contributes nothing; it never aborts the
//! range.

use std::thread;
use std::time::Duration;

use rayon::ThreadPoolBuilder;

use crate::mirror::extract::{Extractor, MediaReference};
use crate::mirror::fetch::Fetcher;

/// Inclusive interval of discoverable page numbers, immutable for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexRange {
    start: u64,
    end: u64,
}

impl IndexRange {
    /// `start` must not exceed `end`; the config layer validates this before
    /// a range is ever built.
    pub(crate) fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "inverted index range [{start}, {end}]");
        IndexRange { start, end }
    }

    pub(crate) fn start(&self) -> u64 {
        self.start
    }

    pub(crate) fn end(&self) -> u64 {
        self.end
    }

    pub(crate) fn indices(&self) -> std::ops::RangeInclusive<u64> {
        self.start..=self.end
    }

    pub(crate) fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }
}

/// Everything discovery needs to know about the source: where the pages live
/// and how hard to hit them.
pub(crate) struct DiscoveryPlan {
    range: IndexRange,
    base_url: String,
    page_url_template: String,
    concurrency: usize,
    task_delay: Duration,
}

impl DiscoveryPlan {
    pub(crate) fn new(
        range: IndexRange,
        base_url: String,
        page_url_template: String,
        concurrency: usize,
        task_delay: Duration,
    ) -> Self {
        DiscoveryPlan {
            range,
            base_url,
            page_url_template,
            concurrency,
            task_delay,
        }
    }

    pub(crate) fn range(&self) -> IndexRange {
        self.range
    }

    pub(crate) fn page_url(&self, index: u64) -> String {
        self.page_url_template.replace("{page}", &index.to_string())
    }

    /// The referer sent with a page fetch is the previous page's URL, or the
    /// source root for the first unit, mimicking a user paging forward.
    pub(crate) fn referer_for(&self, index: u64) -> String {
        if index > self.range.start() {
            self.page_url(index - 1)
        } else {
            self.base_url.clone()
        }
    }
}

/// Runs the extractor across the full index range and returns the discovered
/// references sorted by origin index.
pub(crate) fn discover(
    plan: &DiscoveryPlan,
    extractor: &dyn Extractor,
    fetcher: &dyn Fetcher,
) -> Vec<MediaReference> {
    let indices: Vec<u64> = plan.range().indices().collect();
    let mut slots: Vec<Option<MediaReference>> = vec![None; indices.len()];

    let pool = ThreadPoolBuilder::new()
        .num_threads(plan.concurrency.max(1))
        .build()
        .expect("Failed to create discovery thread pool");

    pool.scope(|s| {
        for (index, slot) in indices.iter().copied().zip(slots.iter_mut()) {
            s.spawn(move |_| {
                *slot = scrape_page(index, plan, extractor, fetcher);
                if !plan.task_delay.is_zero() {
                    thread::sleep(plan.task_delay);
                }
            });
        }
    });

    let mut found: Vec<MediaReference> = slots.into_iter().flatten().collect();
    found.sort_by_key(MediaReference::origin_index);
    found
}

fn scrape_page(
    index: u64,
    plan: &DiscoveryPlan,
    extractor: &dyn Extractor,
    fetcher: &dyn Fetcher,
) -> Option<MediaReference> {
    let page_url = plan.page_url(index);
    let headers = vec![("Referer".to_string(), plan.referer_for(index))];

    trace!("[P{index}] Scraping {page_url}");
    let document = match fetcher.fetch_document(&page_url, &headers) {
        Ok(document) => document,
        Err(e) => {
            warn!("[P{index}] Failed to fetch {page_url}: {e}");
            return None;
        }
    };

    match extractor.extract(&document, index, &page_url) {
        Some(reference) => {
            info!(
                "[P{index}] Found {}: {}",
                reference.kind().label(),
                reference.source_url()
            );
            Some(reference)
        }
        None => {
            trace!("[P{index}] No media reference on page");
            None
        }
    }
}
