// Raw samples as delivered by the sample store, and the ingest batch that feeds it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::PodInfo;

/// Tag context resolved by the sample source. Any tag may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tags {
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub pod: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// One per-process observation. CPU times are cumulative nanoseconds; disk fields are
/// cumulative bytes (`read_bytes`/`write_bytes` hit the block device, `rchar`/`wchar`
/// count every read/write syscall).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSample {
    pub timestamp_ns: i64,
    pub upid: String,
    #[serde(default)]
    pub tags: Tags,
    pub rss: i64,
    pub vsize: i64,
    pub cpu_ktime_ns: i64,
    pub cpu_utime_ns: i64,
    pub read_bytes: i64,
    pub write_bytes: i64,
    pub rchar: i64,
    pub wchar: i64,
}

/// One per-pod network observation; all fields are cumulative.
/// Tags are filled in from the pod table on read and ignored on ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSample {
    pub timestamp_ns: i64,
    pub pod_id: String,
    #[serde(default)]
    pub tags: Tags,
    pub rx_bytes: i64,
    pub tx_bytes: i64,
    pub rx_errors: i64,
    pub tx_errors: i64,
    pub rx_drops: i64,
    pub tx_drops: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBatch {
    #[serde(default)]
    pub processes: Vec<ProcessSample>,
    #[serde(default)]
    pub network: Vec<NetworkSample>,
    #[serde(default)]
    pub pods: Vec<PodInfo>,
}

impl IngestBatch {
    pub fn len(&self) -> usize {
        self.processes.len() + self.network.len() + self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend(&mut self, other: IngestBatch) {
        self.processes.extend(other.processes);
        self.network.extend(other.network);
        self.pods.extend(other.pods);
    }
}
