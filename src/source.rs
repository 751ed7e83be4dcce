// Read contract between the pipelines and whatever stores samples.
// Adapters filter by node and resolve tag context; the engine never does either.

use std::future::Future;

use crate::models::{NetworkSample, ProcessSample};

/// Bounded scan: samples for one node with `start_ns <= t < end_ns`.
/// `end_ns = None` reads up to the newest sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanQuery {
    pub node: String,
    pub start_ns: i64,
    pub end_ns: Option<i64>,
}

pub trait ProcessSampleSource: Send + Sync {
    /// Process samples whose process runs on `query.node`. Order is irrelevant.
    fn scan_process_samples(
        &self,
        query: &ScanQuery,
    ) -> impl Future<Output = anyhow::Result<Vec<ProcessSample>>> + Send;
}

pub trait NetworkSampleSource: Send + Sync {
    /// Network samples of pods scheduled on `query.node`, with pod tags resolved.
    fn scan_network_samples(
        &self,
        query: &ScanQuery,
    ) -> impl Future<Output = anyhow::Result<Vec<NetworkSample>>> + Send;
}
