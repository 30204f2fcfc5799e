use std::fmt;

/// Aggregate counters for one mirror run. Counters only ever increase;
/// the report is merged single-threaded at phase and batch boundaries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RunReport {
    discovered: usize,
    downloaded: usize,
    skipped: usize,
    failed: usize,
}

impl RunReport {
    pub(crate) fn new(discovered: usize) -> Self {
        RunReport {
            discovered,
            ..RunReport::default()
        }
    }

    pub(crate) fn discovered(&self) -> usize {
        self.discovered
    }

    pub(crate) fn downloaded(&self) -> usize {
        self.downloaded
    }

    pub(crate) fn skipped(&self) -> usize {
        self.skipped
    }

    pub(crate) fn failed(&self) -> usize {
        self.failed
    }

    pub(crate) fn record_downloaded(&mut self) {
        self.downloaded += 1;
    }

    pub(crate) fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn record_failed(&mut self) {
        self.failed += 1;
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} discovered, {} downloaded, {} skipped, {} failed",
            self.discovered, self.downloaded, self.skipped, self.failed
        )
    }
}
