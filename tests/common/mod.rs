// Shared test helpers

#![allow(dead_code)]

use std::collections::BTreeMap;

use utilization::models::*;

pub const SEC: i64 = 1_000_000_000;

pub const TEST_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[database]
path = "data/test.db"
flush_rate = 1
flush_interval_secs = 1

[aggregation]
window_secs = 10
"#;

pub fn tags(node: &str, pod: &str, container: Option<&str>, labels: &[(&str, &str)]) -> Tags {
    Tags {
        node: Some(node.to_string()),
        pod: Some(pod.to_string()),
        container: container.map(str::to_string),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

/// Process sample with CPU time split evenly between kernel and user.
pub fn process(timestamp_ns: i64, upid: &str, tags: Tags, cpu_ns: i64, rss: i64) -> ProcessSample {
    ProcessSample {
        timestamp_ns,
        upid: upid.to_string(),
        tags,
        rss,
        vsize: rss * 2,
        cpu_ktime_ns: cpu_ns / 2,
        cpu_utime_ns: cpu_ns - cpu_ns / 2,
        read_bytes: 0,
        write_bytes: 0,
        rchar: 0,
        wchar: 0,
    }
}

pub fn network(timestamp_ns: i64, pod_id: &str, rx_bytes: i64, tx_bytes: i64) -> NetworkSample {
    NetworkSample {
        timestamp_ns,
        pod_id: pod_id.to_string(),
        tags: Tags::default(),
        rx_bytes,
        tx_bytes,
        rx_errors: 0,
        tx_errors: 0,
        rx_drops: 0,
        tx_drops: 0,
    }
}

pub fn pod(pod_id: &str, name: &str, node: &str, labels: &[(&str, &str)]) -> PodInfo {
    PodInfo {
        pod_id: pod_id.to_string(),
        name: name.to_string(),
        namespace: "default".to_string(),
        node: node.to_string(),
        created_at_ns: 1_700_000_000 * SEC,
        status: PodStatus::Running,
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
