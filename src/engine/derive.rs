// Delta and rate derivation.
//
// Unit rule for every pipeline: counter rates are per second of wall-clock time,
// `delta / (W_ns / 1e9)`. Counter units pass through unchanged, so byte counters
// become bytes/s and CPU-nanosecond counters become CPU-ns/s. Gauges become their
// window mean. Output metrics then scale and sum those values; nothing else about
// the finest-grain aggregate survives this stage.

use super::field::MetricSet;
use super::reduce::{EntityWindowAggregate, EntityWindowKey, FieldAccumulator, Reduction};
use super::rollup::Additive;
use super::window::WindowWidth;

/// Output metrics of one entity in one window, ready for rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRates {
    pub key: EntityWindowKey,
    pub metrics: Additive,
}

/// Derived value of each raw field: gauge mean or counter rate per second.
pub fn field_values(agg: &EntityWindowAggregate, width: WindowWidth) -> Vec<f64> {
    let secs = width.as_secs_f64();
    agg.fields
        .iter()
        .map(|f| match f {
            FieldAccumulator::Gauge(g) => g.mean(),
            FieldAccumulator::Counter(c) => c.delta() as f64 / secs,
        })
        .collect()
}

pub fn derive(agg: &EntityWindowAggregate, metrics: &MetricSet, width: WindowWidth) -> Additive {
    Additive::new(metrics.evaluate(&field_values(agg, width)))
}

/// Rates for every aggregate, ordered by key so later float sums are reproducible.
pub fn derive_all(
    reduction: Reduction,
    metrics: &MetricSet,
    width: WindowWidth,
) -> Vec<EntityRates> {
    let mut rows: Vec<EntityRates> = reduction
        .aggregates
        .into_iter()
        .map(|(key, agg)| EntityRates {
            metrics: derive(&agg, metrics, width),
            key,
        })
        .collect();
    rows.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    rows
}
