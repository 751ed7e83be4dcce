// Pipeline orchestration: scan a source, map rows to engine samples for the requested
// grouping dimension, run the engine off the async runtime, map rows back out.

pub mod network;
pub mod resource;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::engine::{Aggregation, Engine, EngineError, MetricSet, Sample, WindowWidth};
use crate::models::Tags;

pub const DEFAULT_PARALLEL_THRESHOLD: usize = 100_000;

/// Dimension that entities are rolled up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Pod,
    Container,
    Node,
    Label(String),
}

impl GroupBy {
    /// Group value for one row's tags; `None` when the tag is missing or empty.
    pub fn resolve<'a>(&self, tags: &'a Tags) -> Option<&'a str> {
        let value = match self {
            GroupBy::Pod => tags.pod.as_deref(),
            GroupBy::Container => tags.container.as_deref(),
            GroupBy::Node => tags.node.as_deref(),
            GroupBy::Label(key) => tags.labels.get(key).map(String::as_str),
        };
        value.filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid grouping dimension {0:?}: expected pod, container, node or label:<key>")]
pub struct ParseGroupByError(String);

impl FromStr for GroupBy {
    type Err = ParseGroupByError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pod" => Ok(GroupBy::Pod),
            "container" => Ok(GroupBy::Container),
            "node" => Ok(GroupBy::Node),
            _ => match s.strip_prefix("label:") {
                Some(key) if !key.is_empty() => Ok(GroupBy::Label(key.to_string())),
                _ => Err(ParseGroupByError(s.to_string())),
            },
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupBy::Pod => f.write_str("pod"),
            GroupBy::Container => f.write_str("container"),
            GroupBy::Node => f.write_str("node"),
            GroupBy::Label(key) => write!(f, "label:{key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRequest {
    pub node: String,
    pub start_ns: i64,
    pub end_ns: Option<i64>,
    pub group_by: GroupBy,
    pub window: WindowWidth,
}

/// Per-invocation execution settings.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub parallel_threshold: usize,
    /// Checked between reduction stages.
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(parallel_threshold: usize) -> Self {
        Self {
            parallel_threshold,
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLEL_THRESHOLD)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("sample source failed: {0:#}")]
    Source(anyhow::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("aggregation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Builds an engine sample, resolving the group from `tags`.
pub(crate) fn to_sample(
    timestamp_ns: i64,
    entity_id: String,
    tags: &Tags,
    group_by: &GroupBy,
    values: Vec<i64>,
) -> Sample {
    Sample {
        timestamp_ns,
        entity_id,
        group: group_by.resolve(tags).map(str::to_string),
        values,
    }
}

/// Runs the engine on the blocking pool. Reduction is CPU-bound and must not stall
/// the runtime; the token stops it between stages if the caller goes away.
pub(crate) async fn aggregate(
    samples: Vec<Sample>,
    metrics: MetricSet,
    window: WindowWidth,
    ctx: &RunContext,
) -> Result<Aggregation, PipelineError> {
    let cancel = ctx.cancel.clone();
    let parallel_threshold = ctx.parallel_threshold;
    let aggregation = tokio::task::spawn_blocking(move || {
        Engine {
            metrics: &metrics,
            width: window,
            parallel_threshold,
        }
        .run(&samples, &cancel)
    })
    .await??;
    Ok(aggregation)
}
