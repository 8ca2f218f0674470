//! Job-scoped metrics.
//!
//! Every job owns one [`MetricsAccumulator`]. Translators and engines update
//! it while the job runs; the result exposes point-in-time
//! [`MetricsSnapshot`]s, and a [`MetricsSink`] receives the final snapshot.

mod accumulator;
mod checkpoint;
mod sink;
mod snapshot;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

pub use accumulator::MetricsAccumulator;
pub use checkpoint::{CHECKPOINT_FILE_NAME, MetricsCheckpoint};
pub use sink::{JsonFileMetricsSink, LogMetricsSink, MetricsPusher, MetricsSink};
pub use snapshot::MetricsSnapshot;

/// Tracing target for metrics operations.
pub const TRACING_TARGET: &str = "strata_runtime::metrics";

/// Identifies a metric.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    /// Step that reported the metric, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Metric namespace.
    pub namespace: String,
    /// Metric name.
    pub name: String,
}

impl MetricKey {
    /// Creates a key not attributed to a step.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step: None,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Attributes the metric to a step.
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }
}

/// Value of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricValue {
    /// Monotonic sum.
    Counter { value: i64 },
    /// Last reported value.
    Gauge { value: i64, timestamp: Timestamp },
    /// Summary of reported values.
    Distribution {
        sum: i64,
        count: u64,
        min: i64,
        max: i64,
    },
}

impl MetricValue {
    /// Creates a distribution holding a single value.
    pub fn distribution(value: i64) -> Self {
        Self::Distribution {
            sum: value,
            count: 1,
            min: value,
            max: value,
        }
    }

    /// Combines two values of the same metric.
    ///
    /// Counters add, gauges keep the most recent value, distributions merge.
    /// Values of different kinds resolve to `other`.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Counter { value: a }, Self::Counter { value: b }) => Self::Counter {
                value: a.saturating_add(b),
            },
            (Self::Gauge { timestamp: a, .. }, Self::Gauge { timestamp: b, .. }) if b < a => self,
            (
                Self::Distribution {
                    sum: s1,
                    count: c1,
                    min: min1,
                    max: max1,
                },
                Self::Distribution {
                    sum: s2,
                    count: c2,
                    min: min2,
                    max: max2,
                },
            ) => Self::Distribution {
                sum: s1.saturating_add(s2),
                count: c1.saturating_add(c2),
                min: min1.min(min2),
                max: max1.max(max2),
            },
            (_, other) => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_add() {
        let merged = MetricValue::Counter { value: 2 }.merge(MetricValue::Counter { value: 3 });
        assert_eq!(merged, MetricValue::Counter { value: 5 });
    }

    #[test]
    fn gauges_keep_latest() {
        let early = Timestamp::from_second(10).unwrap();
        let late = Timestamp::from_second(20).unwrap();
        let old = MetricValue::Gauge {
            value: 1,
            timestamp: early,
        };
        let new = MetricValue::Gauge {
            value: 2,
            timestamp: late,
        };

        assert_eq!(old.merge(new), new);
        assert_eq!(new.merge(old), new);
    }

    #[test]
    fn distributions_merge() {
        let merged = MetricValue::distribution(4).merge(MetricValue::distribution(-1));
        assert_eq!(merged, MetricValue::Distribution {
            sum: 3,
            count: 2,
            min: -1,
            max: 4,
        });
    }
}
