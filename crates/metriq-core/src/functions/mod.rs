//! Function library
//!
//! Every function receives the series produced by the preceding part of the
//! query and returns new series. Output ids carry the function name as a
//! display label (`host1:cpu:load avg`), so piping `m(...) >| avg` keeps both
//! the raw and the averaged series.
//!
//! | name | arguments |
//! |------|-----------|
//! | `avg` | none, a point count, or a relative time |
//! | `bucket` | none |
//! | `filter` | numbers to exclude |
//! | `deriv`, `int` | none |
//! | `min`, `max` | none |
//! | `mavg` | none, a window size, or a relative time window |
//! | `corr` | none |
//! | `sum`, `mul` | optional `false` to zero-fill gaps |
//! | `graph`, `area`, `histo` | none; graph queries only |

mod arithmetic;
mod average;
mod bucket;
mod calculus;
mod correlation;
mod extrema;
mod filter;
mod moving_average;

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::MetricValue;
use crate::query::{Argument, Evaluator, QueryKind};
use crate::series::{MetricValueList, SeriesMap};

pub use average::average_to_points;
pub use correlation::{correlation_with_time_shift, pearson};

/// How a graph query's result is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    /// Line graph
    Line,
    /// Stacked area graph
    Area,
    /// Histogram of values
    Histogram,
}

/// A library function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `avg`
    Average,
    /// `bucket`
    Bucket,
    /// `filter`
    Filter,
    /// `deriv`
    Derivative,
    /// `int`
    Integral,
    /// `min`
    Min,
    /// `max`
    Max,
    /// `mavg`
    MovingAverage,
    /// `corr`
    Correlation,
    /// `sum`
    Sum,
    /// `mul`
    Multiply,
    /// `graph`, `area`, `histo`
    Render(RenderKind),
}

const BASE_FUNCTIONS: [Function; 11] = [
    Function::Average,
    Function::Bucket,
    Function::Filter,
    Function::Derivative,
    Function::Integral,
    Function::Min,
    Function::Max,
    Function::MovingAverage,
    Function::Correlation,
    Function::Sum,
    Function::Multiply,
];

const RENDER_FUNCTIONS: [Function; 3] = [
    Function::Render(RenderKind::Line),
    Function::Render(RenderKind::Area),
    Function::Render(RenderKind::Histogram),
];

impl Function {
    /// Name used in queries
    pub fn name(self) -> &'static str {
        match self {
            Self::Average => "avg",
            Self::Bucket => "bucket",
            Self::Filter => "filter",
            Self::Derivative => "deriv",
            Self::Integral => "int",
            Self::Min => "min",
            Self::Max => "max",
            Self::MovingAverage => "mavg",
            Self::Correlation => "corr",
            Self::Sum => "sum",
            Self::Multiply => "mul",
            Self::Render(RenderKind::Line) => "graph",
            Self::Render(RenderKind::Area) => "area",
            Self::Render(RenderKind::Histogram) => "histo",
        }
    }

    /// Functions available to a kind of query
    pub fn available(kind: QueryKind) -> Vec<Function> {
        let mut functions = BASE_FUNCTIONS.to_vec();
        if kind == QueryKind::Graph {
            functions.extend(RENDER_FUNCTIONS);
        }
        functions
    }

    /// Resolve a function name for a kind of query
    pub fn lookup(name: &str, kind: QueryKind) -> Result<Self> {
        Self::available(kind)
            .into_iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| Error::parse(format!("{name} is not a valid function name")))
    }

    /// Whether this is a graph rendering function
    pub fn is_render(self) -> bool {
        matches!(self, Self::Render(_))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A function with its arguments, as it appears in a query
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// The function
    pub function: Function,
    /// Literal arguments
    pub args: Vec<Argument>,
}

impl FunctionCall {
    /// Create a call
    pub fn new(function: Function, args: Vec<Argument>) -> Self {
        Self { function, args }
    }

    /// Reject arguments the function cannot accept before anything is evaluated
    pub fn validate(&self) -> Result<()> {
        let args = self.args.as_slice();
        match self.function {
            Function::Average => average::chunk_size(args).map(drop),
            Function::Filter => filter::excluded_values(args).map(drop),
            Function::MovingAverage => moving_average::window_size(args, 2).map(drop),
            Function::Sum | Function::Multiply => match args {
                [] | [Argument::Boolean(_)] => Ok(()),
                _ => Err(Error::parse(format!(
                    "{} takes at most one boolean argument",
                    self.function
                ))),
            },
            _ if args.is_empty() => Ok(()),
            _ => Err(Error::parse(format!("{} does not take arguments", self.function))),
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.function)?;
        if !self.args.is_empty() {
            let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
            write!(f, "({})", args.join(", "))?;
        }
        Ok(())
    }
}

/// What a function can see besides its input series
pub struct FunctionContext<'a> {
    /// Evaluator running the query; gives access to the store and configuration
    pub evaluator: &'a Evaluator,
    /// Query window start (ms)
    pub start: i64,
    /// Query window end (ms)
    pub end: i64,
}

/// Run `call` over `input`
pub fn apply(call: &FunctionCall, ctx: &FunctionContext<'_>, input: SeriesMap) -> Result<SeriesMap> {
    debug!(function = %call, series = input.len(), "Applying function");

    let args = call.args.as_slice();
    match call.function {
        Function::Average => average::average(args, input),
        Function::Bucket => bucket::bucket(ctx.evaluator.config().bucket_max_points, input),
        Function::Filter => filter::filter(args, input),
        Function::Derivative => calculus::derivative(input),
        Function::Integral => calculus::integral(input),
        Function::Min => extrema::extreme(Function::Min, input),
        Function::Max => extrema::extreme(Function::Max, input),
        Function::MovingAverage => moving_average::moving_average(args, ctx, input),
        Function::Correlation => correlation::correlation(ctx, input),
        Function::Sum => arithmetic::arithmetic(crate::query::MathOp::Add, args, input),
        Function::Multiply => arithmetic::arithmetic(crate::query::MathOp::Multiply, args, input),
        // drawing happens once the whole query has run
        Function::Render(_) => Ok(SeriesMap::new()),
    }
}

/// Mean of a non-empty run, stamped with the run's first sample
pub(crate) fn mean(values: &[MetricValue]) -> MetricValue {
    #[allow(clippy::cast_precision_loss)]
    let mean = values.iter().map(|v| v.value).sum::<f64>() / values.len() as f64;
    values[0].with_value(mean)
}

/// Empty list covering the same window as `template`
pub(crate) fn empty_like(template: &MetricValueList) -> Result<MetricValueList> {
    MetricValueList::with_increment(template.start_time(), template.end_time(), template.increment_secs())
}

/// List from computed samples, or an empty copy of `template`'s window when there are none
pub(crate) fn rebuild(values: Vec<MetricValue>, template: &MetricValueList) -> Result<MetricValueList> {
    if values.is_empty() {
        empty_like(template)
    } else {
        MetricValueList::from_values(values)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::models::{Metric, MetricId, MetricValue};
    use crate::query::Evaluator;
    use crate::series::{MetricValueList, SeriesMap};
    use crate::store::InMemoryStore;
    use crate::time::MS_PER_MINUTE;

    pub fn id(device: &str) -> MetricId {
        MetricId::new(device, "cpu", "load")
    }

    /// Series with one sample per listed `(minute, value)`
    pub fn list(points: &[(i64, f64)]) -> MetricValueList {
        let mut list = MetricValueList::new(0, 1000 * MS_PER_MINUTE).unwrap();
        list.add_values(points.iter().map(|(m, v)| MetricValue::new(m * MS_PER_MINUTE, *v, "")))
            .unwrap();
        list
    }

    /// Series with one sample per minute starting at minute zero
    pub fn per_minute(values: &[f64]) -> MetricValueList {
        #[allow(clippy::cast_possible_wrap)]
        let points: Vec<(i64, f64)> = values.iter().enumerate().map(|(i, v)| (i as i64, *v)).collect();
        list(&points)
    }

    pub fn context(entries: Vec<(MetricId, MetricValueList)>) -> SeriesMap {
        entries.into_iter().collect()
    }

    pub fn evaluator(metrics: &[Metric]) -> Evaluator {
        Evaluator::from_store(Arc::new(InMemoryStore::from_metrics(metrics).unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_query_kind() {
        assert_eq!(Function::lookup("mavg", QueryKind::Alert).unwrap(), Function::MovingAverage);
        assert_eq!(
            Function::lookup("histo", QueryKind::Graph).unwrap(),
            Function::Render(RenderKind::Histogram)
        );
        assert_eq!(
            Function::lookup("graph", QueryKind::Alert).unwrap_err().to_string(),
            "graph is not a valid function name"
        );
        assert_eq!(
            Function::lookup("predict", QueryKind::Graph).unwrap_err().to_string(),
            "predict is not a valid function name"
        );
    }

    #[test]
    fn test_available() {
        assert_eq!(Function::available(QueryKind::Alert).len(), 11);
        assert_eq!(Function::available(QueryKind::Graph).len(), 14);
    }

    #[test]
    fn test_call_display() {
        let call = FunctionCall::new(
            Function::Filter,
            vec![Argument::Number(crate::query::Number::Integer(0)), Argument::Boolean(true)],
        );
        assert_eq!(call.to_string(), "filter(0, true)");
    }

    #[test]
    fn test_validate_arguments() {
        use crate::query::Number;

        assert!(FunctionCall::new(Function::Average, vec![Argument::Number(Number::Integer(5))])
            .validate()
            .is_ok());
        assert!(FunctionCall::new(Function::Sum, vec![Argument::Boolean(false)]).validate().is_ok());
        assert_eq!(
            FunctionCall::new(Function::Derivative, vec![Argument::Boolean(true)])
                .validate()
                .unwrap_err()
                .to_string(),
            "deriv does not take arguments"
        );
        assert_eq!(
            FunctionCall::new(Function::MovingAverage, vec![Argument::Number(Number::Integer(1))])
                .validate()
                .unwrap_err()
                .to_string(),
            "Moving average window size is too small"
        );
        assert_eq!(
            FunctionCall::new(Function::Filter, vec![Argument::String("x".into())])
                .validate()
                .unwrap_err()
                .to_string(),
            "Filter arguments must be numbers"
        );
    }
}
