// Output rows returned to callers: one per (window, group).
// `time` is the window start in nanoseconds; rates are per second.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsageRow {
    pub time: i64,
    pub group: String,
    /// Percent of one CPU; above 100 when the group uses more than one core.
    pub cpu_usage: f64,
    pub actual_disk_read_throughput: f64,
    pub actual_disk_write_throughput: f64,
    pub total_disk_read_throughput: f64,
    pub total_disk_write_throughput: f64,
    pub rss: f64,
    pub vsize: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkUsageRow {
    pub time: i64,
    pub group: String,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
    pub rx_errors_per_sec: f64,
    pub tx_errors_per_sec: f64,
    pub rx_drops_per_sec: f64,
    pub tx_drops_per_sec: f64,
}
