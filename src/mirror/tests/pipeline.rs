use std::collections::HashSet;
use std::fs;
use std::time::Duration;

use tempfile::tempdir;

use super::support::{FakeExtractor, FakeFetcher};
use crate::mirror::discovery::{DiscoveryPlan, IndexRange, discover};
use crate::mirror::extract::{MediaKind, MediaReference};
use crate::mirror::identity::assign_items;
use crate::mirror::retrieval::{RetrievalConfig, retrieve};

const BASE: &str = "https://gallery.example";

fn page_url(index: u64) -> String {
    format!("{BASE}/en/feed/{index}")
}

fn media_url(index: u64) -> String {
    format!("https://cdn.example/uploads/photo_{index:03}.jpg")
}

fn plan(start: u64, end: u64, concurrency: usize) -> DiscoveryPlan {
    DiscoveryPlan::new(
        IndexRange::new(start, end),
        BASE.to_string(),
        format!("{BASE}/en/feed/{{page}}"),
        concurrency,
        Duration::ZERO,
    )
}

fn no_pacing(concurrency: usize, batch_size: usize) -> RetrievalConfig {
    RetrievalConfig::new(concurrency, batch_size, Duration::ZERO, Duration::ZERO)
}

#[test]
fn end_to_end_mirror_run_is_idempotent() {
    let mut fetcher = FakeFetcher::new();
    for index in 1..=5 {
        fetcher = fetcher.with_document(&page_url(index), "<html></html>");
    }
    for index in [1u64, 3, 5] {
        fetcher = fetcher.with_payload(&media_url(index), format!("payload {index}").as_bytes());
    }

    let extractor = FakeExtractor::new()
        .with_hit(1, &media_url(1))
        .with_hit(3, &media_url(3))
        .with_hit(5, &media_url(5));

    let references = discover(&plan(1, 5, 3), &extractor, &fetcher);
    let indices: Vec<u64> = references.iter().map(|r| r.origin_index()).collect();
    assert_eq!(indices, vec![1, 3, 5]);

    let items = assign_items(references);
    let dir = tempdir().unwrap();

    let report = retrieve(&items, dir.path(), &no_pacing(2, 100), &fetcher);
    assert_eq!(report.discovered(), 3);
    assert_eq!(report.downloaded(), 3);
    assert_eq!(report.skipped(), 0);
    assert_eq!(report.failed(), 0);

    let body = fs::read(dir.path().join("photo_003.jpg")).unwrap();
    assert_eq!(body, b"payload 3");

    // A second run over the same items must touch nothing.
    let rerun = retrieve(&items, dir.path(), &no_pacing(2, 100), &fetcher);
    assert_eq!(rerun.downloaded(), 0);
    assert_eq!(rerun.skipped(), 3);
    assert_eq!(rerun.failed(), 0);
}

#[test]
fn discovery_order_is_independent_of_completion_order() {
    // Later pages answer faster, so completion order is roughly the reverse
    // of index order.
    let mut fetcher = FakeFetcher::new();
    let mut extractor = FakeExtractor::new();
    for index in 1..=6u64 {
        fetcher = fetcher
            .with_document(&page_url(index), "<html></html>")
            .with_latency(&page_url(index), Duration::from_millis((6 - index) * 30));
        extractor = extractor.with_hit(index, &media_url(index));
    }

    let references = discover(&plan(1, 6, 6), &extractor, &fetcher);
    let indices: Vec<u64> = references.iter().map(|r| r.origin_index()).collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn failing_page_never_aborts_the_range() {
    let mut fetcher = FakeFetcher::new();
    let mut extractor = FakeExtractor::new();
    for index in 1..=4u64 {
        fetcher = fetcher.with_document(&page_url(index), "<html></html>");
        extractor = extractor.with_hit(index, &media_url(index));
    }
    let fetcher = fetcher.with_failure(&page_url(2));

    let references = discover(&plan(1, 4, 2), &extractor, &fetcher);
    let indices: Vec<u64> = references.iter().map(|r| r.origin_index()).collect();
    assert_eq!(indices, vec![1, 3, 4]);
}

#[test]
fn failing_item_is_isolated_and_leaves_no_partial_file() {
    let mut fetcher = FakeFetcher::new();
    let mut references = Vec::new();
    for index in 1..=4u64 {
        references.push(MediaReference::new(
            media_url(index),
            MediaKind::Image,
            index,
            page_url(index),
        ));
        if index == 2 {
            fetcher = fetcher.with_failure(&media_url(index));
        } else {
            fetcher = fetcher.with_payload(&media_url(index), b"bytes");
        }
    }

    let items = assign_items(references);
    let dir = tempdir().unwrap();
    let report = retrieve(&items, dir.path(), &no_pacing(4, 100), &fetcher);

    assert_eq!(report.downloaded(), 3);
    assert_eq!(report.failed(), 1);
    assert!(!dir.path().join("photo_002.jpg").exists());

    // The failed task must not leave a fully-formed or partial file behind.
    for entry in fs::read_dir(dir.path()).unwrap() {
        let name = entry.unwrap().file_name();
        let name = name.to_string_lossy().into_owned();
        assert!(!name.ends_with(".part"), "stray partial file {name}");
    }
}

#[test]
fn retrieval_processes_batches_in_order_with_a_barrier() {
    let mut fetcher = FakeFetcher::new();
    let mut references = Vec::new();
    for index in 1..=250u64 {
        references.push(MediaReference::new(
            media_url(index),
            MediaKind::Image,
            index,
            page_url(index),
        ));
        fetcher = fetcher.with_payload(&media_url(index), b"bytes");
    }

    let items = assign_items(references);
    let dir = tempdir().unwrap();
    let report = retrieve(&items, dir.path(), &no_pacing(8, 100), &fetcher);
    assert_eq!(report.downloaded(), 250);

    // 3 batches of 100, 100 and 50; within a batch completion order is free,
    // but no item of batch N+1 may start before batch N has fully finished.
    let streamed = fetcher.streamed_urls();
    assert_eq!(streamed.len(), 250);
    for (batch_index, expected) in items.chunks(100).enumerate() {
        let expected: HashSet<&str> = expected
            .iter()
            .map(|item| item.reference().source_url())
            .collect();
        let observed: HashSet<&str> = streamed[batch_index * 100..]
            .iter()
            .take(expected.len())
            .map(String::as_str)
            .collect();
        assert_eq!(observed, expected, "batch {} out of order", batch_index + 1);
    }
}

#[test]
fn retrieval_of_nothing_reports_nothing() {
    let fetcher = FakeFetcher::new();
    let dir = tempdir().unwrap();
    let report = retrieve(&[], dir.path(), &no_pacing(2, 100), &fetcher);
    assert_eq!(report.discovered(), 0);
    assert_eq!(report.downloaded(), 0);
    assert_eq!(report.skipped(), 0);
    assert_eq!(report.failed(), 0);
}
