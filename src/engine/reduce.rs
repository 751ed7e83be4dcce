// Finest-grain reduction: one aggregate per (entity, window, group).
// Gauges keep an exact integer sum and count; counters keep their min and max
// observation. Both are commutative and associative, so input order and partitioning
// never change the result.

use std::collections::HashMap;

use rayon::prelude::*;

use super::field::{FieldKind, MetricSet};
use super::window::{WindowWidth, window_start};
use super::EngineError;

/// One observation of one entity, with values ordered like the metric set's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub timestamp_ns: i64,
    pub entity_id: String,
    /// Value of the grouping tag; `None` when the tag could not be resolved.
    pub group: Option<String>,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityWindowKey {
    pub entity_id: String,
    pub window_start: i64,
    pub group: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GaugeMean {
    pub sum: i128,
    pub count: u64,
}

impl GaugeMean {
    pub fn observe(&mut self, value: i64) {
        self.sum += i128::from(value);
        self.count += 1;
    }

    pub fn merge(&mut self, other: &GaugeMean) {
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum as f64 / self.count as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub value: i64,
    pub at_ns: i64,
}

/// Min and max of a counter inside one window, each with the time it was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSpan {
    pub min: Observation,
    pub max: Observation,
}

impl CounterSpan {
    pub fn new(value: i64, at_ns: i64) -> Self {
        let obs = Observation { value, at_ns };
        Self { min: obs, max: obs }
    }

    pub fn observe(&mut self, value: i64, at_ns: i64) {
        self.merge(&Self::new(value, at_ns));
    }

    /// Ties keep the earliest minimum and the latest maximum.
    pub fn merge(&mut self, other: &CounterSpan) {
        if (other.min.value, other.min.at_ns) < (self.min.value, self.min.at_ns) {
            self.min = other.min;
        }
        if (other.max.value, other.max.at_ns) > (self.max.value, self.max.at_ns) {
            self.max = other.max;
        }
    }

    /// Signed change over the window. `max - min` for a non-decreasing counter; when
    /// the maximum was seen before the minimum (a reset) the result is negative.
    /// A reset back to exactly the earlier minimum is not visible: ties keep the
    /// earliest minimum, so `0, 100, 0` yields `+100`. Resets are not corrected.
    pub fn delta(&self) -> i64 {
        if self.max.at_ns >= self.min.at_ns {
            self.max.value.saturating_sub(self.min.value)
        } else {
            self.min.value.saturating_sub(self.max.value)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccumulator {
    Gauge(GaugeMean),
    Counter(CounterSpan),
}

impl FieldAccumulator {
    fn first(kind: FieldKind, value: i64, at_ns: i64) -> Self {
        match kind {
            FieldKind::Gauge => {
                let mut g = GaugeMean::default();
                g.observe(value);
                FieldAccumulator::Gauge(g)
            }
            FieldKind::Counter => FieldAccumulator::Counter(CounterSpan::new(value, at_ns)),
        }
    }

    fn observe(&mut self, value: i64, at_ns: i64) {
        match self {
            FieldAccumulator::Gauge(g) => g.observe(value),
            FieldAccumulator::Counter(c) => c.observe(value, at_ns),
        }
    }

    fn merge(&mut self, other: &FieldAccumulator) {
        match (self, other) {
            (FieldAccumulator::Gauge(a), FieldAccumulator::Gauge(b)) => a.merge(b),
            (FieldAccumulator::Counter(a), FieldAccumulator::Counter(b)) => a.merge(b),
            // Both sides are built from the same field set.
            _ => debug_assert!(false, "field kind mismatch while merging aggregates"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityWindowAggregate {
    pub samples: u64,
    pub fields: Vec<FieldAccumulator>,
}

impl EntityWindowAggregate {
    fn first(metrics: &MetricSet, values: &[i64], at_ns: i64) -> Self {
        let fields = metrics
            .fields()
            .iter()
            .zip(values)
            .map(|(spec, &v)| FieldAccumulator::first(spec.kind, v, at_ns))
            .collect();
        Self { samples: 1, fields }
    }

    fn observe(&mut self, values: &[i64], at_ns: i64) {
        self.samples += 1;
        for (acc, &v) in self.fields.iter_mut().zip(values) {
            acc.observe(v, at_ns);
        }
    }

    pub fn merge(&mut self, other: &EntityWindowAggregate) {
        self.samples += other.samples;
        for (acc, o) in self.fields.iter_mut().zip(&other.fields) {
            acc.merge(o);
        }
    }
}

/// Output of the finest-grain stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
    pub aggregates: HashMap<EntityWindowKey, EntityWindowAggregate>,
    /// Samples dropped because their group tag was missing.
    pub skipped: usize,
}

impl Reduction {
    pub fn merge(mut self, other: Reduction) -> Reduction {
        // Fold the smaller map into the larger one.
        let (mut into, from) = if self.aggregates.len() >= other.aggregates.len() {
            (std::mem::take(&mut self.aggregates), other.aggregates)
        } else {
            (other.aggregates, std::mem::take(&mut self.aggregates))
        };
        for (key, agg) in from {
            match into.get_mut(&key) {
                Some(existing) => existing.merge(&agg),
                None => {
                    into.insert(key, agg);
                }
            }
        }
        Reduction {
            aggregates: into,
            skipped: self.skipped + other.skipped,
        }
    }
}

pub fn reduce<'a, I>(
    samples: I,
    metrics: &MetricSet,
    width: WindowWidth,
) -> Result<Reduction, EngineError>
where
    I: IntoIterator<Item = &'a Sample>,
{
    let expected = metrics.fields().len();
    let mut out = Reduction::default();
    for s in samples {
        if s.values.len() != expected {
            return Err(EngineError::FieldCountMismatch {
                entity_id: s.entity_id.clone(),
                expected,
                got: s.values.len(),
            });
        }
        let Some(group) = s.group.as_ref() else {
            out.skipped += 1;
            continue;
        };
        let key = EntityWindowKey {
            entity_id: s.entity_id.clone(),
            window_start: window_start(s.timestamp_ns, width)?,
            group: group.clone(),
        };
        match out.aggregates.get_mut(&key) {
            Some(agg) => agg.observe(&s.values, s.timestamp_ns),
            None => {
                let agg = EntityWindowAggregate::first(metrics, &s.values, s.timestamp_ns);
                out.aggregates.insert(key, agg);
            }
        }
    }
    Ok(out)
}

/// Same result as [`reduce`], computed over `chunk_size` partitions in parallel.
pub fn reduce_parallel(
    samples: &[Sample],
    metrics: &MetricSet,
    width: WindowWidth,
    chunk_size: usize,
) -> Result<Reduction, EngineError> {
    samples
        .par_chunks(chunk_size.max(1))
        .map(|chunk| reduce(chunk, metrics, width))
        .try_reduce(Reduction::default, |a, b| Ok(a.merge(b)))
}
