//! In-memory metric store
//!
//! Samples are kept per metric in one-minute slots; a later sample in the same
//! minute replaces the earlier one.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::debug;

use super::{MetricMetadata, MetricReader, MetricRequest, MetricWriter};
use crate::error::{Error, Result};
use crate::models::{Metric, MetricId, MetricValue};
use crate::series::{MetricValueList, SeriesMap};
use crate::time::{round_down, MS_PER_MINUTE};

/// Thread-safe store backed by ordered maps
#[derive(Debug, Default)]
pub struct InMemoryStore {
    series: RwLock<HashMap<MetricId, BTreeMap<i64, MetricValue>>>,
}

impl InMemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `metrics`
    pub fn from_metrics(metrics: &[Metric]) -> Result<Self> {
        let store = Self::new();
        store.write_metrics(metrics)?;
        Ok(store)
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.series.read().values().map(BTreeMap::len).sum()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricWriter for InMemoryStore {
    fn write_metrics(&self, metrics: &[Metric]) -> Result<usize> {
        let mut series = self.series.write();

        for metric in metrics {
            if metric.id.has_wildcard() {
                return Err(Error::store(format!(
                    "Cannot store a metric with a wildcard id: {}",
                    metric.id
                )));
            }

            let slot = round_down(metric.value.timestamp, MS_PER_MINUTE);
            let mut value = metric.value.clone();
            value.timestamp = slot;

            series
                .entry(metric.id.unlabelled())
                .or_default()
                .insert(slot, value);
        }

        debug!(count = metrics.len(), "Stored metrics");
        Ok(metrics.len())
    }
}

impl MetricReader for InMemoryStore {
    fn read_metrics(&self, requests: &[MetricRequest]) -> Result<SeriesMap> {
        let series = self.series.read();
        let mut result = SeriesMap::new();

        for request in requests {
            let mut list = MetricValueList::new(request.start, request.end)?;
            if let Some(values) = series.get(&request.id) {
                list.add_values(
                    values
                        .range(list.start_time()..=request.end)
                        .map(|(_, v)| v.clone()),
                )?;
            }
            result.insert(request.id.clone(), list);
        }

        Ok(result)
    }
}

impl MetricMetadata for InMemoryStore {
    fn read_metric_ids(&self) -> Result<Vec<MetricId>> {
        let mut ids: Vec<MetricId> = self.series.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
