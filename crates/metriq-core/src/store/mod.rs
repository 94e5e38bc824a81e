//! Time-series store interfaces
//!
//! The query engine reads through [`MetricReader`] and resolves wildcards
//! through [`MetricMetadata`]; ingestion writes through [`MetricWriter`].
//! [`InMemoryStore`] implements all three.

mod memory;

use crate::error::Result;
use crate::models::{Metric, MetricId, MetricPattern};
use crate::series::{MetricValueList, SeriesMap};

pub use memory::InMemoryStore;

/// One series to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRequest {
    /// Concrete metric id
    pub id: MetricId,
    /// Window start (ms)
    pub start: i64,
    /// Window end (ms)
    pub end: i64,
}

impl MetricRequest {
    /// Create a request
    pub fn new(id: MetricId, start: i64, end: i64) -> Self {
        Self { id, start, end }
    }
}

/// Reads stored series
pub trait MetricReader: Send + Sync {
    /// Fetch a batch of series; every request gets an entry, empty when there is no data
    fn read_metrics(&self, requests: &[MetricRequest]) -> Result<SeriesMap>;

    /// Fetch one series
    fn read_metric(&self, id: &MetricId, start: i64, end: i64) -> Result<MetricValueList> {
        let request = MetricRequest::new(id.clone(), start, end);
        let result = self.read_metrics(std::slice::from_ref(&request))?;
        match result.get(id) {
            Some(list) => Ok(list.clone()),
            None => MetricValueList::new(start, end),
        }
    }
}

/// Persists incoming samples
pub trait MetricWriter: Send + Sync {
    /// Store samples; returns how many were written
    fn write_metrics(&self, metrics: &[Metric]) -> Result<usize>;
}

/// Answers questions about which metrics exist
pub trait MetricMetadata: Send + Sync {
    /// Every known metric id
    fn read_metric_ids(&self) -> Result<Vec<MetricId>>;

    /// Distinct devices, sorted
    fn unique_devices(&self) -> Result<Vec<String>> {
        let mut devices: Vec<String> = self.read_metric_ids()?.into_iter().map(|id| id.device).collect();
        devices.sort();
        devices.dedup();
        Ok(devices)
    }

    /// Distinct groups, sorted
    fn unique_groups(&self) -> Result<Vec<String>> {
        let mut groups: Vec<String> = self.read_metric_ids()?.into_iter().map(|id| id.group).collect();
        groups.sort();
        groups.dedup();
        Ok(groups)
    }

    /// Distinct metric names within `group`, sorted
    fn unique_names(&self, group: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .read_metric_ids()?
            .into_iter()
            .filter(|id| id.group == group)
            .map(|id| id.name)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Resolve wildcards to the known concrete ids.
    ///
    /// A concrete id is returned as is, known or not.
    fn expand_metric_id(&self, id: &MetricId) -> Result<Vec<MetricId>> {
        if !id.has_wildcard() {
            return Ok(vec![id.unlabelled()]);
        }

        let pattern = MetricPattern::new(id)?;
        let mut expanded = Vec::new();
        for known in self.read_metric_ids()? {
            if pattern.matches(&known)? {
                expanded.push(known);
            }
        }
        expanded.sort();
        Ok(expanded)
    }
}
