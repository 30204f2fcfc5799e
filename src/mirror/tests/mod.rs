//! Pipeline tests.
//!
//! The coordinators are exercised end to end against in-memory fakes of the
//! fetch and extractor capabilities, with injected latency and per-URL
//! faults.

mod pipeline;
mod support;
