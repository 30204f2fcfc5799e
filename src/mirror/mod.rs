use std::fs::create_dir_all;
use std::path::Path;

use anyhow::{Context, Error};

use crate::mirror::discovery::{DiscoveryPlan, IndexRange, discover};
use crate::mirror::extract::Extractor;
use crate::mirror::fetch::Fetcher;
use crate::mirror::identity::assign_items;
use crate::mirror::io::Config;
use crate::mirror::report::RunReport;
use crate::mirror::retrieval::{RetrievalConfig, retrieve};

pub(crate) mod discovery;
pub(crate) mod extract;
pub(crate) mod fetch;
pub(crate) mod identity;
pub(crate) mod io;
pub(crate) mod report;
pub(crate) mod retrieval;

#[cfg(test)]
mod tests;

/// Ties the two pipeline phases together: discovery across the index range,
/// filename assignment, then batched retrieval into the download directory.
pub(crate) struct MirrorConnector<'a> {
    config: &'a Config,
    extractor: &'a dyn Extractor,
    fetcher: &'a dyn Fetcher,
}

impl<'a> MirrorConnector<'a> {
    pub(crate) fn new(
        config: &'a Config,
        extractor: &'a dyn Extractor,
        fetcher: &'a dyn Fetcher,
    ) -> Self {
        MirrorConnector {
            config,
            extractor,
            fetcher,
        }
    }

    /// Runs a full mirror pass. The only fatal error is an unusable download
    /// directory; everything per-page and per-item is absorbed into the
    /// report.
    pub(crate) fn run(&self) -> Result<RunReport, Error> {
        let dest_dir = Path::new(self.config.download_directory());
        create_dir_all(dest_dir).with_context(|| {
            format!(
                "Failed to create download directory {}",
                dest_dir.display()
            )
        })?;

        let range = IndexRange::new(self.config.start_page(), self.config.end_page());
        let plan = DiscoveryPlan::new(
            range,
            self.config.base_url().to_string(),
            self.config.page_url_template().to_string(),
            self.config.discovery_concurrency(),
            self.config.discovery_delay(),
        );

        info!(
            "--- Phase 1: Discovering media (pages {} to {}) | {} workers ---",
            range.start(),
            range.end(),
            self.config.discovery_concurrency()
        );
        let references = discover(&plan, self.extractor, self.fetcher);
        info!(
            "--- Phase 1 finished: {} media references collected from {} pages ---",
            console::style(references.len()).cyan(),
            range.len()
        );

        if references.is_empty() {
            warn!("No media references were discovered, nothing to retrieve.");
            return Ok(RunReport::new(0));
        }

        let items = assign_items(references);
        let retrieval_config = RetrievalConfig::new(
            self.config.download_concurrency(),
            self.config.batch_size(),
            self.config.download_delay(),
            self.config.batch_delay(),
        );

        info!(
            "--- Phase 2: Retrieving {} items in batches of {} | {} workers ---",
            items.len(),
            self.config.batch_size(),
            self.config.download_concurrency()
        );
        let report = retrieve(&items, dest_dir, &retrieval_config, self.fetcher);

        info!(
            "Run complete: {}",
            console::style(&report).color256(39).italic()
        );
        Ok(report)
    }
}
