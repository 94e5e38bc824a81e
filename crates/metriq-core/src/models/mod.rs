//! Data models for Metriq

pub mod metric;
pub mod records;

pub use metric::{Metric, MetricId, MetricPattern, MetricValue, WILDCARD};
pub use records::{ActionKind, ActionRecord, AlertRecord};
