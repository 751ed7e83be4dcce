// Label maps are stored as JSON text columns.

use std::collections::BTreeMap;

pub(super) fn encode(labels: &BTreeMap<String, String>) -> anyhow::Result<String> {
    Ok(serde_json::to_string(labels)?)
}

/// Corrupt label text decodes to no labels; grouping by a label then skips the row.
pub(super) fn decode(text: &str) -> BTreeMap<String, String> {
    serde_json::from_str(text).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "labels decode (corrupt), using empty");
        BTreeMap::new()
    })
}
