// Group rollup: sum per-entity output metrics into one row per (window, group).
//
// Every metric that survives past the finest grain is additive. Gauge means were
// taken per entity, so summing them gives the group total (e.g. total resident
// memory), and every further level (group -> cluster) is a plain sum again. There is
// no averaging past the finest grain.

use std::collections::BTreeMap;

use super::derive::EntityRates;

/// Metric vector whose only combining operation is element-wise addition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Additive(Vec<f64>);

impl Additive {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn into_values(self) -> Vec<f64> {
        self.0
    }

    pub fn add(&mut self, other: &Additive) {
        if self.0.len() < other.0.len() {
            self.0.resize(other.0.len(), 0.0);
        }
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a += b;
        }
    }
}

/// One output row: `time` is the window start in nanoseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupWindowAggregate {
    pub time: i64,
    pub group: String,
    pub metrics: Additive,
}

/// Sums entity rows sharing a (window, group). Output is ordered by (time, group);
/// no input means no rows.
pub fn rollup<I>(rows: I) -> Vec<GroupWindowAggregate>
where
    I: IntoIterator<Item = EntityRates>,
{
    sum_by_key(rows.into_iter().map(|r| ((r.key.window_start, r.key.group), r.metrics)))
}

/// Further sum-only level, e.g. group -> cluster. Rows mapped to `None` are dropped.
pub fn regroup<F>(rows: Vec<GroupWindowAggregate>, mut to_group: F) -> Vec<GroupWindowAggregate>
where
    F: FnMut(&str) -> Option<String>,
{
    sum_by_key(
        rows.into_iter()
            .filter_map(|r| to_group(&r.group).map(|g| ((r.time, g), r.metrics))),
    )
}

fn sum_by_key<I>(rows: I) -> Vec<GroupWindowAggregate>
where
    I: Iterator<Item = ((i64, String), Additive)>,
{
    let mut by_key: BTreeMap<(i64, String), Additive> = BTreeMap::new();
    for (key, metrics) in rows {
        by_key.entry(key).or_default().add(&metrics);
    }
    by_key
        .into_iter()
        .map(|((time, group), metrics)| GroupWindowAggregate {
            time,
            group,
            metrics,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::reduce::EntityWindowKey;

    fn rates(entity: &str, window: i64, group: &str, values: &[f64]) -> EntityRates {
        EntityRates {
            key: EntityWindowKey {
                entity_id: entity.into(),
                window_start: window,
                group: group.into(),
            },
            metrics: Additive::new(values.to_vec()),
        }
    }

    #[test]
    fn empty_input_has_no_rows() {
        assert!(rollup(Vec::new()).is_empty());
    }

    #[test]
    fn sums_entities_in_same_group_and_window() {
        let rows = vec![
            rates("a", 0, "g1", &[1.0, 10.0]),
            rates("b", 0, "g1", &[2.0, 20.0]),
            rates("c", 0, "g2", &[4.0, 40.0]),
            rates("a", 10, "g1", &[8.0, 80.0]),
        ];
        let out = rollup(rows);
        assert_eq!(out.len(), 3);
        assert_eq!((out[0].time, out[0].group.as_str()), (0, "g1"));
        assert_eq!(out[0].metrics.values(), &[3.0, 30.0]);
        assert_eq!((out[1].time, out[1].group.as_str()), (0, "g2"));
        assert_eq!(out[1].metrics.values(), &[4.0, 40.0]);
        assert_eq!((out[2].time, out[2].group.as_str()), (10, "g1"));
        assert_eq!(out[2].metrics.values(), &[8.0, 80.0]);
    }

    #[test]
    fn rollup_equals_sum_of_independent_rates() {
        for n in 0..6 {
            let rows: Vec<EntityRates> = (0..n)
                .map(|i| rates(&format!("e{i}"), 0, "g", &[i as f64 * 1.5]))
                .collect();
            let expected: f64 = rows.iter().map(|r| r.metrics.values()[0]).sum();
            let out = rollup(rows);
            if n == 0 {
                assert!(out.is_empty());
            } else {
                assert_eq!(out.len(), 1);
                assert_eq!(out[0].metrics.values()[0], expected);
            }
        }
    }

    #[test]
    fn negative_rates_are_summed_not_clamped() {
        let out = rollup(vec![
            rates("a", 0, "g", &[-6.0]),
            rates("b", 0, "g", &[2.0]),
        ]);
        assert_eq!(out[0].metrics.values(), &[-4.0]);
    }

    #[test]
    fn regroup_is_another_sum() {
        let groups = rollup(vec![
            rates("a", 0, "pod-1", &[1.0]),
            rates("b", 0, "pod-2", &[2.0]),
            rates("c", 0, "orphan", &[100.0]),
        ]);
        let cluster = regroup(groups, |g| g.starts_with("pod-").then(|| "cluster".to_string()));
        assert_eq!(cluster.len(), 1);
        assert_eq!(cluster[0].group, "cluster");
        assert_eq!(cluster[0].metrics.values(), &[3.0]);
    }
}
