// Pipeline tests: in-memory sources through the full engine

mod common;

use common::*;
use utilization::engine::{EngineError, WindowWidth, regroup};
use utilization::models::{NetworkSample, ProcessSample, Tags};
use utilization::pipeline::network::network_usage;
use utilization::pipeline::resource::resource_usage;
use utilization::pipeline::{GroupBy, PipelineError, RunContext, UsageRequest};
use utilization::source::{NetworkSampleSource, ProcessSampleSource, ScanQuery};

#[derive(Default)]
struct MemorySource {
    processes: Vec<ProcessSample>,
    network: Vec<NetworkSample>,
}

fn in_scan(query: &ScanQuery, tags: &Tags, ts: i64) -> bool {
    tags.node.as_deref() == Some(query.node.as_str())
        && ts >= query.start_ns
        && query.end_ns.is_none_or(|end| ts < end)
}

impl ProcessSampleSource for MemorySource {
    async fn scan_process_samples(&self, query: &ScanQuery) -> anyhow::Result<Vec<ProcessSample>> {
        Ok(self
            .processes
            .iter()
            .filter(|s| in_scan(query, &s.tags, s.timestamp_ns))
            .cloned()
            .collect())
    }
}

impl NetworkSampleSource for MemorySource {
    async fn scan_network_samples(&self, query: &ScanQuery) -> anyhow::Result<Vec<NetworkSample>> {
        Ok(self
            .network
            .iter()
            .filter(|s| in_scan(query, &s.tags, s.timestamp_ns))
            .cloned()
            .collect())
    }
}

struct FailingSource;

impl ProcessSampleSource for FailingSource {
    async fn scan_process_samples(&self, _query: &ScanQuery) -> anyhow::Result<Vec<ProcessSample>> {
        anyhow::bail!("connection refused")
    }
}

fn request(group_by: GroupBy) -> UsageRequest {
    UsageRequest {
        node: "node-a".into(),
        start_ns: 0,
        end_ns: None,
        group_by,
        window: WindowWidth::from_secs(10).unwrap(),
    }
}

fn tagged_network(ts: i64, pod_id: &str, pod_name: &str, app: &str, rx: i64, tx: i64) -> NetworkSample {
    let mut s = network(ts, pod_id, rx, tx);
    s.tags = tags("node-a", pod_name, None, &[("app", app)]);
    s
}

#[tokio::test]
async fn cpu_usage_per_process_and_per_pod() {
    // Each process burns 2ms of CPU across a 10s window: 0.02% of one core.
    let web = tags("node-a", "web-0", Some("nginx"), &[]);
    let source = MemorySource {
        processes: vec![
            process(0, "p1", web.clone(), 1_000_000, 100),
            process(10 * SEC - 1, "p1", web.clone(), 3_000_000, 300),
            process(SEC, "p2", web.clone(), 5_000_000, 1_000),
            process(10 * SEC - 1, "p2", web.clone(), 7_000_000, 1_000),
        ],
        ..Default::default()
    };

    let per_container = resource_usage(&source, &request(GroupBy::Container), &RunContext::default())
        .await
        .unwrap();
    assert_eq!(per_container.len(), 1);
    let row = &per_container[0];
    assert_eq!(row.time, 0);
    assert_eq!(row.group, "nginx");
    assert_close(row.cpu_usage, 0.04);
    // Gauge means per process, then summed: 200 + 1000
    assert_close(row.rss, 1_200.0);
    assert_close(row.vsize, 2_400.0);
    assert_close(row.actual_disk_read_throughput, 0.0);

    let one_process = MemorySource {
        processes: source.processes[..2].to_vec(),
        ..Default::default()
    };
    let rows = resource_usage(&one_process, &request(GroupBy::Pod), &RunContext::default())
        .await
        .unwrap();
    assert_close(rows[0].cpu_usage, 0.02);
}

#[tokio::test]
async fn groups_split_deterministically() {
    let a = tags("node-a", "web-0", None, &[("team", "blue")]);
    let b = tags("node-a", "db-0", None, &[("team", "green")]);
    let mut processes = Vec::new();
    for (upid, t) in [("p1", &a), ("p2", &b), ("p3", &a)] {
        processes.push(process(0, upid, t.clone(), 0, 10));
        processes.push(process(5 * SEC, upid, t.clone(), 10 * SEC, 10));
        processes.push(process(15 * SEC, upid, t.clone(), 20 * SEC, 10));
    }
    let source = MemorySource {
        processes,
        ..Default::default()
    };
    let req = request(GroupBy::Label("team".into()));

    let first = resource_usage(&source, &req, &RunContext::default())
        .await
        .unwrap();
    let again = resource_usage(&source, &req, &RunContext::new(1))
        .await
        .unwrap();
    assert_eq!(first, again);

    let keys: Vec<(i64, &str)> = first.iter().map(|r| (r.time, r.group.as_str())).collect();
    assert_eq!(
        keys,
        vec![(0, "blue"), (0, "green"), (10 * SEC, "blue"), (10 * SEC, "green")]
    );
    // Window 0: 10s of CPU in 10s per process; blue has two processes
    assert_close(first[0].cpu_usage, 200.0);
    assert_close(first[1].cpu_usage, 100.0);
    // Single sample per entity in window 10s: no delta
    assert_close(first[2].cpu_usage, 0.0);
}

#[tokio::test]
async fn counter_reset_yields_negative_rate() {
    let t = tags("node-a", "web-0", None, &[]);
    let mut before = process(0, "p1", t.clone(), 0, 1);
    before.read_bytes = 100;
    let mut after = process(SEC, "p1", t, 0, 1);
    after.read_bytes = 40;
    let source = MemorySource {
        processes: vec![before, after],
        ..Default::default()
    };

    let rows = resource_usage(&source, &request(GroupBy::Pod), &RunContext::default())
        .await
        .unwrap();
    // -60 bytes over a 10s window
    assert_close(rows[0].actual_disk_read_throughput, -6.0);
}

#[tokio::test]
async fn samples_without_group_are_skipped() {
    let source = MemorySource {
        processes: vec![
            process(0, "p1", tags("node-a", "web-0", None, &[]), 0, 1),
            process(SEC, "p1", tags("node-a", "web-0", None, &[]), SEC, 1),
        ],
        ..Default::default()
    };
    let rows = resource_usage(&source, &request(GroupBy::Container), &RunContext::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn empty_scan_is_empty_result() {
    let source = MemorySource::default();
    let rows = resource_usage(&source, &request(GroupBy::Pod), &RunContext::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
    let rows = network_usage(&source, &request(GroupBy::Pod), &RunContext::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn source_error_propagates() {
    let err = resource_usage(&FailingSource, &request(GroupBy::Pod), &RunContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Source(_)));
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn cancelled_context_stops_the_pipeline() {
    let source = MemorySource {
        processes: vec![process(0, "p1", tags("node-a", "web-0", None, &[]), 0, 1)],
        ..Default::default()
    };
    let ctx = RunContext::default();
    ctx.cancel.cancel();
    let err = resource_usage(&source, &request(GroupBy::Pod), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Engine(EngineError::Cancelled)));
}

#[tokio::test]
async fn network_rates_per_pod_then_per_app() {
    let source = MemorySource {
        network: vec![
            tagged_network(0, "uid-1", "web-0", "web", 0, 0),
            tagged_network(10 * SEC - 1, "uid-1", "web-0", "web", 1_000, 500),
            tagged_network(0, "uid-2", "web-1", "web", 5_000, 0),
            tagged_network(10 * SEC - 1, "uid-2", "web-1", "web", 7_000, 100),
            tagged_network(0, "uid-3", "db-0", "db", 0, 0),
            tagged_network(10 * SEC - 1, "uid-3", "db-0", "db", 10_000, 10_000),
        ],
        ..Default::default()
    };

    let per_pod = network_usage(&source, &request(GroupBy::Pod), &RunContext::default())
        .await
        .unwrap();
    let groups: Vec<&str> = per_pod.iter().map(|r| r.group.as_str()).collect();
    assert_eq!(groups, vec!["db-0", "web-0", "web-1"]);
    assert_close(per_pod[1].rx_bytes_per_sec, 100.0);
    assert_close(per_pod[1].tx_bytes_per_sec, 50.0);

    let per_app = network_usage(
        &source,
        &request(GroupBy::Label("app".into())),
        &RunContext::default(),
    )
    .await
    .unwrap();
    assert_eq!(per_app.len(), 2);
    assert_eq!(per_app[1].group, "web");
    assert_close(per_app[1].rx_bytes_per_sec, 300.0);
    assert_close(per_app[1].tx_bytes_per_sec, 60.0);
    assert_close(per_app[0].rx_bytes_per_sec, 1_000.0);
}

#[tokio::test]
async fn regroup_sums_groups_into_a_cluster_total() {
    let t = |pod: &str| tags("node-a", pod, None, &[]);
    let source = MemorySource {
        processes: vec![
            process(0, "p1", t("web-0"), 0, 100),
            process(SEC, "p1", t("web-0"), SEC, 100),
            process(0, "p2", t("db-0"), 0, 50),
            process(SEC, "p2", t("db-0"), 2 * SEC, 50),
        ],
        ..Default::default()
    };
    let metrics = utilization::pipeline::resource::metric_set().unwrap();
    let samples: Vec<utilization::engine::Sample> = source
        .processes
        .iter()
        .map(|s| utilization::engine::Sample {
            timestamp_ns: s.timestamp_ns,
            entity_id: s.upid.clone(),
            group: s.tags.pod.clone(),
            values: vec![
                s.rss,
                s.vsize,
                s.cpu_ktime_ns,
                s.cpu_utime_ns,
                s.read_bytes,
                s.write_bytes,
                s.rchar,
                s.wchar,
            ],
        })
        .collect();
    let per_pod = utilization::engine::Engine {
        metrics: &metrics,
        width: WindowWidth::from_secs(10).unwrap(),
        parallel_threshold: usize::MAX,
    }
    .run(&samples, &tokio_util::sync::CancellationToken::new())
    .unwrap()
    .rows;
    assert_eq!(per_pod.len(), 2);

    let cluster = regroup(per_pod, |_| Some("cluster".to_string()));
    assert_eq!(cluster.len(), 1);
    // cpu_usage: (1s + 2s) of CPU over 10s = 30%
    assert_close(cluster[0].metrics.values()[0], 30.0);
    // rss
    assert_close(cluster[0].metrics.values()[5], 150.0);
}
