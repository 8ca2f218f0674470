//! Shared metrics accumulator.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use jiff::Timestamp;

use super::{MetricKey, MetricValue, MetricsSnapshot};

/// Job-scoped, thread-safe metrics accumulator.
///
/// Cloning yields another handle to the same accumulator.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    values: Arc<RwLock<BTreeMap<MetricKey, MetricValue>>>,
}

impl MetricsAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an accumulator seeded with a snapshot.
    pub fn from_snapshot(snapshot: MetricsSnapshot) -> Self {
        let accumulator = Self::new();
        accumulator.merge(&snapshot);
        accumulator
    }

    /// Adds `delta` to a counter.
    pub fn inc_counter(&self, key: MetricKey, delta: i64) {
        self.update(key, MetricValue::Counter { value: delta });
    }

    /// Sets a gauge to `value` at the current time.
    pub fn set_gauge(&self, key: MetricKey, value: i64) {
        self.update(key, MetricValue::Gauge {
            value,
            timestamp: Timestamp::now(),
        });
    }

    /// Records a value in a distribution.
    pub fn update_distribution(&self, key: MetricKey, value: i64) {
        self.update(key, MetricValue::distribution(value));
    }

    /// Merges a value into the metric stored under `key`.
    pub fn update(&self, key: MetricKey, value: MetricValue) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        match values.get_mut(&key) {
            Some(current) => *current = current.merge(value),
            None => {
                values.insert(key, value);
            }
        }
    }

    /// Merges every metric of a snapshot into this accumulator.
    pub fn merge(&self, snapshot: &MetricsSnapshot) {
        for (key, value) in snapshot.iter() {
            self.update(key.clone(), *value);
        }
    }

    /// Returns a point-in-time copy of all metrics.
    ///
    /// Never blocks on a running job for longer than a single update.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot::from(values.clone())
    }

    /// Returns the number of distinct metrics.
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no metric was reported yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
