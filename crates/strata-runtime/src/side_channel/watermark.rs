//! Job-scoped watermark table.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Low and high watermarks of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermarks {
    /// No element older than this is expected anymore.
    pub low: Timestamp,
    /// Newest element time observed.
    pub high: Timestamp,
}

#[derive(Debug, Default)]
struct Inner {
    pending: BTreeMap<String, Watermarks>,
    visible: BTreeMap<String, Watermarks>,
}

/// Watermarks of a job keyed by stage.
///
/// Updates are queued by [`add`] and become visible on [`advance`], which
/// runs after every completed streaming batch. Visible watermarks never
/// regress.
///
/// [`add`]: WatermarkTable::add
/// [`advance`]: WatermarkTable::advance
#[derive(Debug, Clone, Default)]
pub struct WatermarkTable {
    inner: Arc<RwLock<Inner>>,
}

impl WatermarkTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a watermark update for a stage.
    pub fn add(&self, key: impl Into<String>, low: Timestamp, high: Timestamp) -> Result<()> {
        if low > high {
            return Err(Error::internal(format!(
                "low watermark {low} is after high watermark {high}"
            )));
        }

        let key = key.into();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let queued = inner
            .pending
            .entry(key)
            .or_insert(Watermarks { low, high });
        queued.low = queued.low.max(low);
        queued.high = queued.high.max(high);
        Ok(())
    }

    /// Makes queued updates visible; returns the number of stages advanced.
    pub fn advance(&self) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let pending = std::mem::take(&mut inner.pending);
        let count = pending.len();

        for (key, update) in pending {
            inner
                .visible
                .entry(key)
                .and_modify(|current| {
                    current.low = current.low.max(update.low);
                    current.high = current.high.max(update.high);
                })
                .or_insert(update);
        }
        count
    }

    /// Returns the visible watermarks of a stage.
    pub fn get(&self, key: &str) -> Option<Watermarks> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.visible.get(key).copied()
    }

    /// Returns all visible watermarks.
    pub fn snapshot(&self) -> BTreeMap<String, Watermarks> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.visible.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(second: i64) -> Timestamp {
        Timestamp::from_second(second).unwrap()
    }

    #[test]
    fn updates_are_invisible_until_advanced() {
        let table = WatermarkTable::new();
        table.add("stage-0", at(10), at(20)).unwrap();
        assert!(table.get("stage-0").is_none());

        assert_eq!(table.advance(), 1);
        assert_eq!(table.get("stage-0").unwrap().low, at(10));
        assert_eq!(table.advance(), 0);
    }

    #[test]
    fn low_watermark_never_regresses() {
        let table = WatermarkTable::new();
        table.add("stage-0", at(10), at(20)).unwrap();
        table.advance();
        table.add("stage-0", at(5), at(30)).unwrap();
        table.advance();

        let watermarks = table.get("stage-0").unwrap();
        assert_eq!(watermarks.low, at(10));
        assert_eq!(watermarks.high, at(30));
    }

    #[test]
    fn rejects_inverted_watermarks() {
        let table = WatermarkTable::new();
        assert!(table.add("stage-0", at(30), at(20)).is_err());
    }
}
