//! Serializable graph payloads

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::functions::RenderKind;
use crate::series::SeriesMap;
use crate::time::ms_to_seconds;

/// Number of histogram buckets between the smallest and largest value
pub const HISTOGRAM_BUCKETS: usize = 20;

/// One plotted sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Timestamp; milliseconds for line graphs, seconds for area graphs
    pub x: i64,
    /// Value
    pub y: f64,
}

/// One histogram bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Lower bound of the bucket
    pub x: f64,
    /// Number of samples in the bucket
    pub y: usize,
    /// Bucket width
    pub dx: f64,
}

/// Rendered query result, one entry in `metrics` per label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphObject {
    /// Line graph
    Line {
        /// Series names
        labels: Vec<String>,
        /// Samples per series
        metrics: Vec<Vec<Point>>,
    },
    /// Stacked area graph
    Area {
        /// Series names
        labels: Vec<String>,
        /// Samples per series
        metrics: Vec<Vec<Point>>,
    },
    /// Histogram of values
    Histogram {
        /// Series names
        labels: Vec<String>,
        /// Bars per series
        metrics: Vec<Vec<HistogramBucket>>,
    },
}

impl GraphObject {
    /// Render `result` the way `kind` draws it
    pub fn render(kind: RenderKind, result: &SeriesMap) -> Self {
        let labels: Vec<String> = result.keys().map(ToString::to_string).collect();

        match kind {
            RenderKind::Line => Self::Line {
                labels,
                metrics: points(result, |ts| ts),
            },
            RenderKind::Area => Self::Area {
                labels,
                metrics: points(result, ms_to_seconds),
            },
            RenderKind::Histogram => Self::Histogram {
                labels,
                metrics: histogram(result),
            },
        }
    }

    /// Series names in drawing order
    pub fn labels(&self) -> &[String] {
        match self {
            Self::Line { labels, .. } | Self::Area { labels, .. } | Self::Histogram { labels, .. } => labels,
        }
    }
}

fn points(result: &SeriesMap, x: fn(i64) -> i64) -> Vec<Vec<Point>> {
    result
        .iter()
        .map(|(id, list)| {
            debug!(metric = %id, values = list.size(), "Rendering series");
            if list.is_empty() {
                warn!(metric = %id, "Found no data");
            }
            list.values()
                .iter()
                .map(|v| Point {
                    x: x(v.timestamp),
                    y: v.value,
                })
                .collect()
        })
        .collect()
}

fn histogram(result: &SeriesMap) -> Vec<Vec<HistogramBucket>> {
    let (min, max) = result
        .values()
        .flat_map(|list| list.values().iter().map(|v| v.value))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    #[allow(clippy::cast_precision_loss)]
    let width = (max - min) / HISTOGRAM_BUCKETS as f64;
    debug!(min, max, width, "Creating histogram");

    result
        .iter()
        .map(|(id, list)| {
            let mut counts = [0usize; HISTOGRAM_BUCKETS];
            for value in list.values() {
                let index = bucket_index(value.value, min, width);
                trace!(metric = %id, value = value.value, index, "Bucketing");
                counts[index] += 1;
            }

            counts
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(index, count)| {
                    #[allow(clippy::cast_precision_loss)]
                    let x = index as f64 * width + min;
                    HistogramBucket { x, y: *count, dx: width }
                })
                .collect()
        })
        .collect()
}

/// Bucket of `value`; the maximum falls into the last bucket and a zero-width range into the first
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bucket_index(value: f64, min: f64, width: f64) -> usize {
    if width <= 0.0 || !width.is_finite() {
        return 0;
    }
    let index = ((value - min) / width).floor().max(0.0) as usize;
    index.min(HISTOGRAM_BUCKETS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricId, MetricValue};
    use crate::series::MetricValueList;
    use crate::time::MS_PER_MINUTE;
    use pretty_assertions::assert_eq;

    fn result(values: &[f64]) -> SeriesMap {
        #[allow(clippy::cast_possible_wrap)]
        let list = MetricValueList::from_values(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| MetricValue::new(i as i64 * MS_PER_MINUTE, *v, "")),
        )
        .unwrap();
        std::iter::once((MetricId::new("h", "cpu", "load"), list)).collect()
    }

    #[test]
    fn test_line_json_shape() {
        let graph = GraphObject::render(RenderKind::Line, &result(&[1.0, 2.0]));
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "line",
                "labels": ["h:cpu:load"],
                "metrics": [[{"x": 0, "y": 1.0}, {"x": 60000, "y": 2.0}]]
            })
        );
    }

    #[test]
    fn test_area_uses_seconds() {
        let GraphObject::Area { metrics, .. } = GraphObject::render(RenderKind::Area, &result(&[1.0, 2.0])) else {
            panic!("expected an area graph");
        };
        assert_eq!(metrics[0][1].x, 60);
    }

    #[test]
    fn test_histogram_buckets() {
        let values: Vec<f64> = (0..=20).map(f64::from).collect();
        let GraphObject::Histogram { labels, metrics } = GraphObject::render(RenderKind::Histogram, &result(&values))
        else {
            panic!("expected a histogram");
        };

        assert_eq!(labels.len(), 1);
        assert_eq!(metrics[0].len(), HISTOGRAM_BUCKETS);
        assert_eq!(metrics[0][0], HistogramBucket { x: 0.0, y: 1, dx: 1.0 });
        // the maximum shares the last bucket
        assert_eq!(metrics[0][19], HistogramBucket { x: 19.0, y: 2, dx: 1.0 });
        assert_eq!(metrics[0].iter().map(|b| b.y).sum::<usize>(), 21);
    }

    #[test]
    fn test_histogram_of_constant_series() {
        let GraphObject::Histogram { metrics, .. } = GraphObject::render(RenderKind::Histogram, &result(&[4.0, 4.0]))
        else {
            panic!("expected a histogram");
        };
        assert_eq!(metrics[0], vec![HistogramBucket { x: 4.0, y: 2, dx: 0.0 }]);
    }
}
