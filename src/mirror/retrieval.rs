//! Phase 2: batched, bounded-concurrency retrieval of the discovered items.
//!
//! Batches are a pacing control, not a semantic grouping: item order is the
//! phase-1 sort, batch N+1 never starts before batch N's tasks have all
//! reported, and an inter-batch pause throttles the remote service. Within a
//! batch every item is one task on a rayon pool; a pre-existing file counts
//! as a successful prior retrieval, which is what makes re-runs after an
//! interruption safe.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use thiserror::Error;

use crate::mirror::fetch::{FetchError, Fetcher};
use crate::mirror::identity::RetrievalItem;
use crate::mirror::report::RunReport;

/// Concurrency and pacing knobs for the retrieval phase.
#[derive(Debug, Clone)]
pub(crate) struct RetrievalConfig {
    concurrency: usize,
    batch_size: usize,
    task_delay: Duration,
    batch_delay: Duration,
}

impl RetrievalConfig {
    pub(crate) fn new(
        concurrency: usize,
        batch_size: usize,
        task_delay: Duration,
        batch_delay: Duration,
    ) -> Self {
        RetrievalConfig {
            concurrency: concurrency.max(1),
            batch_size: batch_size.max(1),
            task_delay,
            batch_delay,
        }
    }
}

#[derive(Debug, Error)]
enum RetrieveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("local I/O failure: {0}")]
    LocalIo(#[from] io::Error),
}

/// Per-task result, written into the task's own slot and tallied after the
/// batch barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Downloaded,
    Skipped,
    Failed,
}

/// Downloads every item into `dest_dir`, batch by batch, and returns the
/// final run report. Per-item failures are counted, never propagated.
pub(crate) fn retrieve(
    items: &[RetrievalItem],
    dest_dir: &Path,
    config: &RetrievalConfig,
    fetcher: &dyn Fetcher,
) -> RunReport {
    let mut report = RunReport::new(items.len());
    if items.is_empty() {
        return report;
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.concurrency)
        .build()
        .expect("Failed to create retrieval thread pool");

    let total_batches = items.len().div_ceil(config.batch_size);
    let progress = build_progress_bar(items.len() as u64);

    for (batch_index, batch) in items.chunks(config.batch_size).enumerate() {
        info!(
            "Processing batch {}/{} ({} items)",
            batch_index + 1,
            total_batches,
            batch.len()
        );

        let mut outcomes = vec![TaskOutcome::Failed; batch.len()];
        pool.scope(|s| {
            for (item, slot) in batch.iter().zip(outcomes.iter_mut()) {
                let progress = progress.clone();
                s.spawn(move |_| {
                    let outcome = retrieve_item(item, dest_dir, fetcher);
                    progress.inc(1);
                    if outcome == TaskOutcome::Downloaded && !config.task_delay.is_zero() {
                        thread::sleep(config.task_delay);
                    }
                    *slot = outcome;
                });
            }
        });

        for outcome in &outcomes {
            match outcome {
                TaskOutcome::Downloaded => report.record_downloaded(),
                TaskOutcome::Skipped => report.record_skipped(),
                TaskOutcome::Failed => report.record_failed(),
            }
        }

        if batch_index + 1 < total_batches && !config.batch_delay.is_zero() {
            info!(
                "Pausing {}s before next batch...",
                config.batch_delay.as_secs()
            );
            thread::sleep(config.batch_delay);
        }
    }

    progress.finish_with_message("Retrieval complete");
    report
}

fn build_progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");

    let progress = ProgressBar::new(len);
    progress.set_style(style);
    progress
}

fn retrieve_item(item: &RetrievalItem, dest_dir: &Path, fetcher: &dyn Fetcher) -> TaskOutcome {
    let index = item.reference().origin_index();
    let final_path = dest_dir.join(item.local_filename());

    if final_path.exists() {
        trace!(
            "[P{index}] File {} already exists, skipping",
            item.local_filename()
        );
        return TaskOutcome::Skipped;
    }

    match download_item(item, &final_path, fetcher) {
        Ok(()) => {
            trace!("[P{index}] Downloaded {}", item.local_filename());
            TaskOutcome::Downloaded
        }
        Err(e) => {
            warn!(
                "[P{index}] Failed to retrieve {} from {}: {e}",
                item.local_filename(),
                item.reference().source_url()
            );
            TaskOutcome::Failed
        }
    }
}

/// Streams one payload to disk. The body goes to a `.part` sibling first and
/// is renamed into place on success, so a failed task leaves no fully-formed
/// file at the final path.
fn download_item(
    item: &RetrievalItem,
    final_path: &Path,
    fetcher: &dyn Fetcher,
) -> Result<(), RetrieveError> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let reference = item.reference();
    let headers = vec![
        (
            "Referer".to_string(),
            reference.origin_document_url().to_string(),
        ),
        (
            "Sec-Fetch-Dest".to_string(),
            reference.kind().fetch_dest().to_string(),
        ),
        ("Sec-Fetch-Site".to_string(), "same-origin".to_string()),
    ];

    let mut body = fetcher.fetch_stream(reference.source_url(), &headers)?;

    let part_path = part_path_for(final_path, item.local_filename());
    let result = write_stream(body.as_mut(), &part_path)
        .and_then(|_| fs::rename(&part_path, final_path).map_err(RetrieveError::from));

    if result.is_err() && part_path.exists() {
        let _ = fs::remove_file(&part_path);
    }
    result
}

fn part_path_for(final_path: &Path, filename: &str) -> PathBuf {
    final_path.with_file_name(format!("{filename}.part"))
}

fn write_stream(body: &mut dyn Read, part_path: &Path) -> Result<(), RetrieveError> {
    let mut writer = BufWriter::new(File::create(part_path)?);
    io::copy(body, &mut writer)?;
    writer.flush()?;
    Ok(())
}
