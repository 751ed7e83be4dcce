// Resource pipeline: per-process CPU, memory and disk samples for one node.

use tracing::{debug, instrument};

use super::{PipelineError, RunContext, UsageRequest, aggregate, to_sample};
use crate::engine::{
    EngineError, FieldSpec, GroupWindowAggregate, MetricSet, NANOS_PER_SEC, OutputSpec, Sample,
};
use crate::models::{ProcessSample, ResourceUsageRow};
use crate::source::{ProcessSampleSource, ScanQuery};

const CPU_PERCENT_SCALE: f64 = 100.0 / NANOS_PER_SEC as f64;

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec::gauge("rss"),
    FieldSpec::gauge("vsize"),
    FieldSpec::counter("cpu_ktime_ns"),
    FieldSpec::counter("cpu_utime_ns"),
    FieldSpec::counter("read_bytes"),
    FieldSpec::counter("write_bytes"),
    FieldSpec::counter("rchar"),
    FieldSpec::counter("wchar"),
];

pub const OUTPUTS: &[OutputSpec] = &[
    OutputSpec {
        name: "cpu_usage",
        sources: &["cpu_ktime_ns", "cpu_utime_ns"],
        scale: CPU_PERCENT_SCALE,
    },
    OutputSpec {
        name: "actual_disk_read_throughput",
        sources: &["read_bytes"],
        scale: 1.0,
    },
    OutputSpec {
        name: "actual_disk_write_throughput",
        sources: &["write_bytes"],
        scale: 1.0,
    },
    OutputSpec {
        name: "total_disk_read_throughput",
        sources: &["rchar"],
        scale: 1.0,
    },
    OutputSpec {
        name: "total_disk_write_throughput",
        sources: &["wchar"],
        scale: 1.0,
    },
    OutputSpec {
        name: "rss",
        sources: &["rss"],
        scale: 1.0,
    },
    OutputSpec {
        name: "vsize",
        sources: &["vsize"],
        scale: 1.0,
    },
];

pub fn metric_set() -> Result<MetricSet, EngineError> {
    MetricSet::new(FIELDS, OUTPUTS)
}

fn sample(s: ProcessSample, request: &UsageRequest) -> Sample {
    to_sample(
        s.timestamp_ns,
        s.upid,
        &s.tags,
        &request.group_by,
        vec![
            s.rss,
            s.vsize,
            s.cpu_ktime_ns,
            s.cpu_utime_ns,
            s.read_bytes,
            s.write_bytes,
            s.rchar,
            s.wchar,
        ],
    )
}

fn row(agg: GroupWindowAggregate) -> ResourceUsageRow {
    let GroupWindowAggregate {
        time,
        group,
        metrics,
    } = agg;
    let mut v = metrics.into_values().into_iter();
    let mut next = || v.next().unwrap_or(0.0);
    ResourceUsageRow {
        time,
        group,
        cpu_usage: next(),
        actual_disk_read_throughput: next(),
        actual_disk_write_throughput: next(),
        total_disk_read_throughput: next(),
        total_disk_write_throughput: next(),
        rss: next(),
        vsize: next(),
    }
}

/// CPU %, disk throughput and memory per (window, group) for processes on one node.
#[instrument(skip(source, ctx), fields(pipeline = "resource", node = %request.node, group_by = %request.group_by))]
pub async fn resource_usage<S>(
    source: &S,
    request: &UsageRequest,
    ctx: &RunContext,
) -> Result<Vec<ResourceUsageRow>, PipelineError>
where
    S: ProcessSampleSource,
{
    let metrics = metric_set()?;
    let query = ScanQuery {
        node: request.node.clone(),
        start_ns: request.start_ns,
        end_ns: request.end_ns,
    };
    let scanned = source
        .scan_process_samples(&query)
        .await
        .map_err(PipelineError::Source)?;
    let samples: Vec<Sample> = scanned.into_iter().map(|s| sample(s, request)).collect();

    let aggregation = aggregate(samples, metrics, request.window, ctx).await?;
    if aggregation.skipped > 0 {
        debug!(
            skipped = aggregation.skipped,
            "process samples without a group value excluded"
        );
    }
    Ok(aggregation.rows.into_iter().map(row).collect())
}
