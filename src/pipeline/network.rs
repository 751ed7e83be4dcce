// Network pipeline: per-pod network counters for pods scheduled on one node.
// The pod is the finest grain; group rollup then sums pods sharing a group.

use tracing::{debug, instrument};

use super::{PipelineError, RunContext, UsageRequest, aggregate, to_sample};
use crate::engine::{EngineError, FieldSpec, GroupWindowAggregate, MetricSet, OutputSpec, Sample};
use crate::models::{NetworkSample, NetworkUsageRow};
use crate::source::{NetworkSampleSource, ScanQuery};

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec::counter("rx_bytes"),
    FieldSpec::counter("tx_bytes"),
    FieldSpec::counter("rx_errors"),
    FieldSpec::counter("tx_errors"),
    FieldSpec::counter("rx_drops"),
    FieldSpec::counter("tx_drops"),
];

pub const OUTPUTS: &[OutputSpec] = &[
    OutputSpec {
        name: "rx_bytes_per_sec",
        sources: &["rx_bytes"],
        scale: 1.0,
    },
    OutputSpec {
        name: "tx_bytes_per_sec",
        sources: &["tx_bytes"],
        scale: 1.0,
    },
    OutputSpec {
        name: "rx_errors_per_sec",
        sources: &["rx_errors"],
        scale: 1.0,
    },
    OutputSpec {
        name: "tx_errors_per_sec",
        sources: &["tx_errors"],
        scale: 1.0,
    },
    OutputSpec {
        name: "rx_drops_per_sec",
        sources: &["rx_drops"],
        scale: 1.0,
    },
    OutputSpec {
        name: "tx_drops_per_sec",
        sources: &["tx_drops"],
        scale: 1.0,
    },
];

pub fn metric_set() -> Result<MetricSet, EngineError> {
    MetricSet::new(FIELDS, OUTPUTS)
}

fn sample(s: NetworkSample, request: &UsageRequest) -> Sample {
    to_sample(
        s.timestamp_ns,
        s.pod_id,
        &s.tags,
        &request.group_by,
        vec![
            s.rx_bytes,
            s.tx_bytes,
            s.rx_errors,
            s.tx_errors,
            s.rx_drops,
            s.tx_drops,
        ],
    )
}

fn row(agg: GroupWindowAggregate) -> NetworkUsageRow {
    let GroupWindowAggregate {
        time,
        group,
        metrics,
    } = agg;
    let mut v = metrics.into_values().into_iter();
    let mut next = || v.next().unwrap_or(0.0);
    NetworkUsageRow {
        time,
        group,
        rx_bytes_per_sec: next(),
        tx_bytes_per_sec: next(),
        rx_errors_per_sec: next(),
        tx_errors_per_sec: next(),
        rx_drops_per_sec: next(),
        tx_drops_per_sec: next(),
    }
}

/// Network rates per (window, group) for pods on one node.
#[instrument(skip(source, ctx), fields(pipeline = "network", node = %request.node, group_by = %request.group_by))]
pub async fn network_usage<S>(
    source: &S,
    request: &UsageRequest,
    ctx: &RunContext,
) -> Result<Vec<NetworkUsageRow>, PipelineError>
where
    S: NetworkSampleSource,
{
    let metrics = metric_set()?;
    let query = ScanQuery {
        node: request.node.clone(),
        start_ns: request.start_ns,
        end_ns: request.end_ns,
    };
    let scanned = source
        .scan_network_samples(&query)
        .await
        .map_err(PipelineError::Source)?;
    let samples: Vec<Sample> = scanned.into_iter().map(|s| sample(s, request)).collect();

    let aggregation = aggregate(samples, metrics, request.window, ctx).await?;
    if aggregation.skipped > 0 {
        debug!(
            skipped = aggregation.skipped,
            "network samples without a group value excluded"
        );
    }
    Ok(aggregation.rows.into_iter().map(row).collect())
}
