// Windowed counter-delta aggregation engine.
// Samples -> window buckets -> per-entity aggregates -> rates -> group sums.
// Pure and synchronous; the caller owns the scan and any async boundary.

mod derive;
mod field;
mod reduce;
mod rollup;
mod window;

pub use derive::{EntityRates, derive, derive_all, field_values};
pub use field::{FieldKind, FieldSpec, MetricSet, OutputSpec};
pub use reduce::{
    CounterSpan, EntityWindowAggregate, EntityWindowKey, FieldAccumulator, GaugeMean,
    Observation, Reduction, Sample, reduce, reduce_parallel,
};
pub use rollup::{Additive, GroupWindowAggregate, regroup, rollup};
pub use window::{NANOS_PER_SEC, WindowError, WindowWidth, window_start};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("timestamp {0} is before the Unix epoch")]
    NegativeTimestamp(i64),
    #[error("sample for entity {entity_id} has {got} values, expected {expected}")]
    FieldCountMismatch {
        entity_id: String,
        expected: usize,
        got: usize,
    },
    #[error("output {output} references unknown field {field}")]
    UnknownField {
        output: &'static str,
        field: &'static str,
    },
    #[error("aggregation cancelled")]
    Cancelled,
}

/// Result of one engine run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregation {
    pub rows: Vec<GroupWindowAggregate>,
    /// Samples excluded because the grouping tag was missing.
    pub skipped: usize,
}

/// One configured run: a metric set and a window width.
pub struct Engine<'a> {
    pub metrics: &'a MetricSet,
    pub width: WindowWidth,
    /// Scans with at least this many samples are reduced in parallel partitions.
    pub parallel_threshold: usize,
}

impl Engine<'_> {
    pub fn run(
        &self,
        samples: &[Sample],
        cancel: &CancellationToken,
    ) -> Result<Aggregation, EngineError> {
        check(cancel)?;
        let reduction = if samples.len() >= self.parallel_threshold.max(1) {
            let partitions = rayon::current_num_threads().max(1);
            let chunk = samples.len().div_ceil(partitions);
            reduce_parallel(samples, self.metrics, self.width, chunk)?
        } else {
            reduce(samples, self.metrics, self.width)?
        };
        let skipped = reduction.skipped;
        let entity_windows = reduction.aggregates.len();

        check(cancel)?;
        let rates = derive_all(reduction, self.metrics, self.width);

        check(cancel)?;
        let rows = rollup(rates);

        debug!(
            samples = samples.len(),
            skipped,
            entity_windows,
            group_windows = rows.len(),
            window_ns = self.width.as_nanos(),
            "aggregation complete"
        );
        Ok(Aggregation { rows, skipped })
    }
}

fn check(cancel: &CancellationToken) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    Ok(())
}
