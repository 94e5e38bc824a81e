//! Recursive evaluation of the query node graph

use std::sync::Arc;

use tracing::{debug, trace};

use super::argument::Argument;
use super::math;
use super::node::{ConnectorKind, MathOp, QueryNode, Source};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::functions::{self, FunctionContext};
use crate::models::{MetricId, MetricValue};
use crate::series::{MetricValueList, SeriesMap};
use crate::store::{MetricMetadata, MetricReader, MetricRequest};
use crate::telemetry::Telemetry;
use crate::time::{round_down, MS_PER_MINUTE};

/// Evaluates query graphs against a metric store
pub struct Evaluator {
    /// Series source
    reader: Arc<dyn MetricReader>,
    /// Wildcard expansion and metric listing
    metadata: Arc<dyn MetricMetadata>,
    /// Evaluation limits and function defaults
    config: EngineConfig,
    /// Span and counters for evaluation events
    telemetry: Telemetry,
}

impl Evaluator {
    /// Create an evaluator with default configuration
    pub fn new(reader: Arc<dyn MetricReader>, metadata: Arc<dyn MetricMetadata>) -> Self {
        Self {
            reader,
            metadata,
            config: EngineConfig::default(),
            telemetry: Telemetry::disabled(),
        }
    }

    /// Create an evaluator over a store that both reads and lists metrics
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: MetricReader + MetricMetadata + 'static,
    {
        Self::new(store.clone(), store)
    }

    /// Use `config` for limits and defaults
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Emit events through `telemetry`
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Series source
    pub fn reader(&self) -> &dyn MetricReader {
        self.reader.as_ref()
    }

    /// Metadata service
    pub fn metadata(&self) -> &dyn MetricMetadata {
        self.metadata.as_ref()
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Telemetry handle
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Evaluate a whole tree over `[start, end]` starting from an empty context
    pub fn evaluate(&self, root: &QueryNode, start: i64, end: i64) -> Result<SeriesMap> {
        let _span = self.telemetry.span().enter();
        self.telemetry.record_evaluation();

        let result = self.process(root, start, end, SeriesMap::new())?;
        debug!(
            series = result.len(),
            points = result.total_points(),
            "Evaluated query"
        );
        Ok(result)
    }

    /// Evaluate `node` over `[start, end]` given the series produced by its preceding sibling
    pub fn process(&self, node: &QueryNode, start: i64, end: i64, context: SeriesMap) -> Result<SeriesMap> {
        trace!(node = %node, context = context.len(), "Processing node");

        match node {
            QueryNode::Source(source) => self.process_source(source, start, end),
            QueryNode::Connector { kind, left, right } => self.process_connector(*kind, left, right, start, end),
            QueryNode::Math { op, left, right, args } => {
                self.process_math(*op, left, right, args, start, end, context)
            }
            QueryNode::Function(call) => {
                let ctx = FunctionContext {
                    evaluator: self,
                    start,
                    end,
                };
                functions::apply(call, &ctx, context)
            }
        }
    }

    fn process_source(&self, source: &Source, start: i64, end: i64) -> Result<SeriesMap> {
        match source {
            Source::Metric { id, offsets } => {
                let ids = self.metadata.expand_metric_id(id)?;
                if ids.is_empty() {
                    debug!(metric = %id, "No metrics match");
                    return Ok(SeriesMap::new());
                }

                let requests: Vec<MetricRequest> = ids
                    .iter()
                    .map(|id| MetricRequest::new(id.clone(), start, end))
                    .collect();
                let mut result = self.reader.read_metrics(&requests)?;

                for id in &ids {
                    for offset in offsets {
                        let shift = offset.millis();
                        let mut list = self.reader.read_metric(id, start + shift, end + shift)?;
                        list.shift_timestamp(-shift);
                        result.insert(id.with_label(&offset.to_string()), list);
                    }
                }

                Ok(result)
            }
            Source::Constant { value, index } => {
                let mut list = MetricValueList::new(start, end)?;
                let mut time = round_down(start, MS_PER_MINUTE);
                while time < end {
                    list.add_value(MetricValue::new(time, *value, ""))?;
                    time += MS_PER_MINUTE;
                }

                let mut result = SeriesMap::new();
                result.insert(Source::constant_id(*index), list);
                Ok(result)
            }
        }
    }

    fn process_connector(
        &self,
        kind: ConnectorKind,
        left: &QueryNode,
        right: &QueryNode,
        start: i64,
        end: i64,
    ) -> Result<SeriesMap> {
        match kind {
            ConnectorKind::Pipe | ConnectorKind::Terminator => {
                let left_result = self.process(left, start, end, SeriesMap::new())?;
                self.process(right, start, end, left_result)
            }
            ConnectorKind::Copy => {
                let left_result = self.process(left, start, end, SeriesMap::new())?;
                let mut result = self.process(right, start, end, left_result.clone())?;
                result.merge_absent(left_result);
                Ok(result)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_math(
        &self,
        op: MathOp,
        left: &QueryNode,
        right: &QueryNode,
        args: &[Argument],
        start: i64,
        end: i64,
        context: SeriesMap,
    ) -> Result<SeriesMap> {
        let use_average = !matches!(args.first(), Some(Argument::Boolean(false)));

        let operands: Vec<(MetricId, MetricValueList)> = if context.is_empty() {
            let left_result = self.process(left, start, end, SeriesMap::new())?;
            let right_result = self.process(right, start, end, SeriesMap::new())?;

            if left_result.len() != 1 || right_result.len() != 1 {
                return Err(Error::parse(
                    "When performing math on metrics, each metric must only return one result",
                ));
            }
            left_result.into_iter().chain(right_result).collect()
        } else {
            check_operand_count(op, context.len())?;
            context.into_iter().collect()
        };

        math::combine(op, operands, use_average)
    }
}

/// Validate how many context series a math operation may combine
pub fn check_operand_count(op: MathOp, count: usize) -> Result<()> {
    if count > 2 && op.is_binary_only() {
        return Err(Error::parse("Cannot subtract or divide more than two metrics"));
    }
    if count == 1 {
        return Err(Error::parse(format!(
            "Trying to perform {} on a single value",
            op.symbol()
        )));
    }
    Ok(())
}
