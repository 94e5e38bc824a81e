//! Graph query execution
//!
//! A compiled [`GraphQuery`] evaluates its expression over the query window,
//! keeps the result within the configured point budget and hands it to the
//! trailing rendering function.

mod render;

pub use render::{GraphObject, HistogramBucket, Point, HISTOGRAM_BUCKETS};

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::functions::{average_to_points, Function, FunctionCall, RenderKind};
use crate::models::MetricValue;
use crate::query::{ConnectorKind, Evaluator, QueryNode};
use crate::series::SeriesMap;

/// A compiled graph query: an expression, a rendering function and a time window
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    root: QueryNode,
    start: i64,
    end: i64,
}

impl GraphQuery {
    /// Wrap a compiled tree.
    ///
    /// A tree that does not end in a rendering function is drawn as a line graph.
    pub fn new(root: QueryNode, start: i64, end: i64) -> Self {
        let root = if root.right().is_some_and(QueryNode::is_render) {
            root
        } else {
            QueryNode::connector(
                ConnectorKind::Copy,
                root,
                QueryNode::Function(FunctionCall::new(Function::Render(RenderKind::Line), Vec::new())),
            )
        };
        Self { root, start, end }
    }

    /// Root of the compiled tree
    pub fn root(&self) -> &QueryNode {
        &self.root
    }

    /// Window start (ms)
    pub fn start_time(&self) -> i64 {
        self.start
    }

    /// Window end (ms)
    pub fn end_time(&self) -> i64 {
        self.end
    }

    /// How the result will be drawn
    pub fn render_kind(&self) -> RenderKind {
        match self.root.right() {
            Some(QueryNode::Function(FunctionCall {
                function: Function::Render(kind),
                ..
            })) => *kind,
            _ => RenderKind::Line,
        }
    }

    /// Evaluate the query and render its result
    pub fn execute(&self, evaluator: &Evaluator) -> Result<GraphObject> {
        let expression = self.root.left().unwrap_or(&self.root);
        let result = evaluator.evaluate(expression, self.start, self.end)?;
        let result = limit_points(result, evaluator)?;
        let result = mark_empty_series(result)?;

        info!(
            series = result.len(),
            points = result.total_points(),
            render = ?self.render_kind(),
            "Graph query executed"
        );
        Ok(GraphObject::render(self.render_kind(), &result))
    }
}

impl fmt::Display for GraphQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] {}", self.start, self.end, self.root)
    }
}

/// Average every series down when one series or the whole result is over budget
fn limit_points(result: SeriesMap, evaluator: &Evaluator) -> Result<SeriesMap> {
    let config = evaluator.config();
    let total = result.total_points();
    let single_over = result.values().any(|list| list.size() > config.max_points_per_metric);

    if total > config.max_total_points || single_over {
        warn!(
            total,
            per_metric = config.max_points_per_metric,
            "Query returned too many points, averaging"
        );
        return average_to_points(result, config.max_points_per_metric);
    }
    Ok(result)
}

/// Give each empty series one zero sample at its start so it still shows in a legend
fn mark_empty_series(result: SeriesMap) -> Result<SeriesMap> {
    result
        .into_iter()
        .map(|(id, mut list)| {
            if list.is_empty() {
                debug!(metric = %id, "No data, adding placeholder point");
                list.add_value(MetricValue::new(list.start_time(), 0.0, ""))?;
            }
            Ok((id, list))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::EngineConfig;
    use crate::models::{Metric, MetricId};
    use crate::store::InMemoryStore;
    use crate::time::MS_PER_MINUTE;
    use pretty_assertions::assert_eq;

    fn id(device: &str) -> MetricId {
        MetricId::new(device, "cpu", "load")
    }

    fn evaluator(minutes: i64) -> Evaluator {
        #[allow(clippy::cast_precision_loss)]
        let metrics: Vec<Metric> = (0..minutes)
            .map(|m| Metric::new(id("host1"), m * MS_PER_MINUTE, m as f64, "%"))
            .collect();
        Evaluator::from_store(Arc::new(InMemoryStore::from_metrics(&metrics).unwrap()))
    }

    #[test]
    fn test_implicit_line_graph() {
        let query = GraphQuery::new(QueryNode::metric(id("host1")), 0, 10 * MS_PER_MINUTE);
        assert_eq!(query.render_kind(), RenderKind::Line);
        assert!(query.root().right().unwrap().is_render());

        let GraphObject::Line { labels, metrics } = query.execute(&evaluator(20)).unwrap() else {
            panic!("expected a line graph");
        };
        assert_eq!(labels, vec!["host1:cpu:load".to_string()]);
        assert_eq!(metrics[0].len(), 11);
        assert_eq!(metrics[0][3], Point { x: 3 * MS_PER_MINUTE, y: 3.0 });
    }

    #[test]
    fn test_explicit_render_kind_is_kept() {
        let root = QueryNode::connector(
            ConnectorKind::Copy,
            QueryNode::metric(id("host1")),
            QueryNode::Function(FunctionCall::new(Function::Render(RenderKind::Histogram), Vec::new())),
        );
        let query = GraphQuery::new(root.clone(), 0, 10 * MS_PER_MINUTE);
        assert_eq!(query.root(), &root);
        assert!(matches!(
            query.execute(&evaluator(20)).unwrap(),
            GraphObject::Histogram { .. }
        ));
    }

    #[test]
    fn test_empty_series_gets_placeholder() {
        let query = GraphQuery::new(QueryNode::metric(id("host1")), 100 * MS_PER_MINUTE, 110 * MS_PER_MINUTE);
        let GraphObject::Line { metrics, .. } = query.execute(&evaluator(20)).unwrap() else {
            panic!("expected a line graph");
        };
        assert_eq!(metrics[0], vec![Point { x: 100 * MS_PER_MINUTE, y: 0.0 }]);
    }

    #[test]
    fn test_point_budget() {
        let config = EngineConfig {
            max_points_per_metric: 10,
            ..EngineConfig::default()
        };
        let evaluator = evaluator(100).with_config(config);
        let query = GraphQuery::new(QueryNode::metric(id("host1")), 0, 99 * MS_PER_MINUTE);

        let GraphObject::Line { labels, metrics } = query.execute(&evaluator).unwrap() else {
            panic!("expected a line graph");
        };
        assert_eq!(labels, vec!["host1:cpu:load avg".to_string()]);
        // ten averages plus the closing point
        assert_eq!(metrics[0].len(), 11);
        assert_eq!(metrics[0].last().unwrap().x, 99 * MS_PER_MINUTE);
    }
}
