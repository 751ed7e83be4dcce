// Pod metadata: node placement for network scans, plus creation time and status for
// pod listings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Pod lifecycle phase; serializes to lowercase JSON (e.g. "running").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PodStatus {
    /// Parse a stored phase string (e.g. "Running", "failed").
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => PodStatus::Pending,
            "running" => PodStatus::Running,
            "succeeded" => PodStatus::Succeeded,
            "failed" => PodStatus::Failed,
            _ => PodStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PodStatus::Pending => "pending",
            PodStatus::Running => "running",
            PodStatus::Succeeded => "succeeded",
            PodStatus::Failed => "failed",
            PodStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    pub pod_id: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub node: String,
    pub created_at_ns: i64,
    pub status: PodStatus,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}
