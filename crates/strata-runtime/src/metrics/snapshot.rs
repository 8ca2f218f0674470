//! Point-in-time metric snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{MetricKey, MetricValue};

/// Metric name characters outside this set are replaced when rendering.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// A serialized metric: the key fields and the value side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetricRecord {
    #[serde(flatten)]
    key: MetricKey,
    value: MetricValue,
}

/// Read-only copy of a job's metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    values: BTreeMap<MetricKey, MetricValue>,
}

impl MetricsSnapshot {
    /// Returns the value stored under `key`.
    pub fn get(&self, key: &MetricKey) -> Option<&MetricValue> {
        self.values.get(key)
    }

    /// Iterates over metrics in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&MetricKey, &MetricValue)> {
        self.values.iter()
    }

    /// Returns the number of metrics.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the snapshot has no metrics.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the sum of all counters with the given name.
    pub fn counter_total(&self, name: &str) -> i64 {
        self.values
            .iter()
            .filter(|(key, _)| key.name == name)
            .filter_map(|(_, value)| match value {
                MetricValue::Counter { value } => Some(*value),
                _ => None,
            })
            .sum()
    }

    /// Renders the snapshot as flat `name -> value` pairs.
    ///
    /// Names are `step.namespace.name` with every character outside
    /// `[A-Za-z0-9-]` replaced by `_`. Distributions render one entry per
    /// statistic.
    pub fn render(&self) -> BTreeMap<String, String> {
        let mut rendered = BTreeMap::new();
        for (key, value) in &self.values {
            let name = key
                .step
                .iter()
                .map(String::as_str)
                .chain([key.namespace.as_str(), key.name.as_str()])
                .map(sanitize)
                .collect::<Vec<_>>()
                .join(".");

            match value {
                MetricValue::Counter { value } | MetricValue::Gauge { value, .. } => {
                    rendered.insert(name, value.to_string());
                }
                MetricValue::Distribution {
                    sum,
                    count,
                    min,
                    max,
                } => {
                    rendered.insert(format!("{name}.count"), count.to_string());
                    rendered.insert(format!("{name}.sum"), sum.to_string());
                    rendered.insert(format!("{name}.min"), min.to_string());
                    rendered.insert(format!("{name}.max"), max.to_string());
                }
            }
        }
        rendered
    }
}

impl From<BTreeMap<MetricKey, MetricValue>> for MetricsSnapshot {
    fn from(values: BTreeMap<MetricKey, MetricValue>) -> Self {
        Self { values }
    }
}

impl Serialize for MetricsSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.values.iter().map(|(key, value)| MetricRecord {
            key: key.clone(),
            value: *value,
        }))
    }
}

impl<'de> Deserialize<'de> for MetricsSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut values: BTreeMap<MetricKey, MetricValue> = BTreeMap::new();
        for record in Vec::<MetricRecord>::deserialize(deserializer)? {
            let merged = match values.remove(&record.key) {
                Some(current) => current.merge(record.value),
                None => record.value,
            };
            values.insert(record.key, merged);
        }
        Ok(Self { values })
    }
}
