//! Folds a parse tree into an executable query

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::debug;

use super::ast::ParseNode;
use super::comparator::{Comparator, Conjunction};
use crate::alerting::{AlertQuery, Condition, TriggerExpression};
use crate::error::{Error, Result};
use crate::functions::{Function, FunctionCall};
use crate::graph::GraphQuery;
use crate::models::{MetricId, WILDCARD};
use crate::query::{Argument, ConnectorKind, MathOp, Number, QueryKind, QueryNode, RelativeTime, Source, TimeUnit};
use crate::time::{round_down, round_up, MS_PER_MINUTE};

/// Alert durations must stay below this many minutes
const MAX_ALERT_MINUTES: i64 = 60;

/// Builds one query; not reused across queries
pub(super) struct TreeBuilder {
    kind: QueryKind,
    now: DateTime<Utc>,
    offset: FixedOffset,
    constants: usize,
}

impl TreeBuilder {
    pub(super) fn new(kind: QueryKind, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            kind,
            now,
            offset,
            constants: 0,
        }
    }

    pub(super) fn graph_query(mut self, node: &ParseNode) -> Result<GraphQuery> {
        let (start, end, expression) = match node {
            ParseNode::GraphQuery { start, end, expression } => (start, end, expression),
            ParseNode::AlertQuery { .. } => return Err(Error::parse("This is an alert query, not a graph query")),
            other => return Err(Error::parse(format!("Expected a graph query, found {}", other.kind()))),
        };

        let root = self.expression(expression)?;
        let (start, end) = self.window(start, end.as_deref())?;
        debug!(%root, start, end, "Built graph query");
        Ok(GraphQuery::new(root, start, end))
    }

    pub(super) fn alert_query(mut self, node: &ParseNode) -> Result<AlertQuery> {
        let (expression, trigger, action) = match node {
            ParseNode::AlertQuery {
                expression,
                trigger,
                action,
            } => (expression, trigger, action),
            ParseNode::GraphQuery { .. } => return Err(Error::parse("This is a graph query, not an alert query")),
            other => return Err(Error::parse(format!("Expected an alert query, found {}", other.kind()))),
        };

        let QueryNode::Source(Source::Metric { id, .. }) = self.expression(expression)? else {
            return Err(Error::parse("Alert queries can only contain one metric"));
        };
        let trigger = self.trigger(trigger)?;
        debug!(metric = %id, %trigger, action = %action, "Built alert query");
        AlertQuery::new(&id, trigger, action.trim())
    }

    fn expression(&mut self, node: &ParseNode) -> Result<QueryNode> {
        match node {
            ParseNode::Expression(children) => self.connectors(children),
            ParseNode::Math { op, children } => self.math(op, children),
            ParseNode::Metric(children) => self.metric(children),
            ParseNode::Function { name, args } => self.function(name, args.as_deref()),
            ParseNode::NumberLiteral(_) | ParseNode::IntegerLiteral(_) => {
                Err(Error::parse("A number can only be used in arithmetic"))
            }
            other => Err(Error::parse(format!("Unexpected {} in an expression", other.kind()))),
        }
    }

    /// Juxtaposed operands are copied together, then `connector operand` pairs fold left to right
    fn connectors(&mut self, children: &[ParseNode]) -> Result<QueryNode> {
        let Some((first, rest)) = children.split_first() else {
            return Err(Error::parse("Empty expression"));
        };

        let mut node = self.expression(first)?;
        let mut rest = rest.iter().peekable();

        while let Some(operand) = rest.next_if(|n| !matches!(n, ParseNode::Connector(_))) {
            node = QueryNode::connector(ConnectorKind::Copy, node, self.expression(operand)?);
        }

        while let Some(next) = rest.next() {
            let ParseNode::Connector(token) = next else {
                return Err(Error::parse(format!("Expected a connector, found {}", next.kind())));
            };
            if self.kind == QueryKind::Alert {
                return Err(Error::parse("Alert queries do not support connectors"));
            }
            let kind = ConnectorKind::from_token(token)?;
            let operand = rest
                .next()
                .ok_or_else(|| Error::parse(format!("Connector {token} is missing its right side")))?;
            node = QueryNode::connector(kind, node, self.expression(operand)?);
        }

        Ok(node)
    }

    fn math(&mut self, op: &str, children: &[ParseNode]) -> Result<QueryNode> {
        match children {
            [single] => self.operand(single),
            [left, right] => {
                let op = MathOp::from_token(op)?;
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                Ok(QueryNode::math(op, left, right))
            }
            _ => Err(Error::parse(format!(
                "A math expression must have one or two operands, had {}",
                children.len()
            ))),
        }
    }

    /// Like `expression`, but numbers become constant series
    fn operand(&mut self, node: &ParseNode) -> Result<QueryNode> {
        match unwrap_single(node) {
            ParseNode::NumberLiteral(image) => Ok(self.constant(number(image)?.as_f64())),
            #[allow(clippy::cast_precision_loss)]
            ParseNode::IntegerLiteral(value) => Ok(self.constant(*value as f64)),
            other => self.expression(other),
        }
    }

    fn constant(&mut self, value: f64) -> QueryNode {
        self.constants += 1;
        QueryNode::constant(value, self.constants)
    }

    fn metric(&mut self, children: &[ParseNode]) -> Result<QueryNode> {
        let count = children.len();
        match self.kind {
            QueryKind::Alert if count < 3 => {
                return Err(Error::parse(format!(
                    "A metric must have 3 arguments (device, group, name), had {count}"
                )))
            }
            QueryKind::Alert if count > 3 => {
                return Err(Error::parse("A metric in an alert query cannot have an overlay time"))
            }
            QueryKind::Graph if count < 3 => {
                return Err(Error::parse(format!(
                    "A metric must have at least 3 arguments (device, group, name), had {count}"
                )))
            }
            QueryKind::Graph if count > 4 => {
                return Err(Error::parse(format!(
                    "A metric takes at most one overlay argument, had {}",
                    count - 3
                )))
            }
            _ => {}
        }

        let devices = field_values(&children[0])?;
        let groups = field_values(&children[1])?;
        let names = field_values(&children[2])?;

        if self.kind == QueryKind::Alert {
            let ([device], [group], [name]) = (devices.as_slice(), groups.as_slice(), names.as_slice()) else {
                return Err(Error::parse("Cannot specify more than one metric in an alert query"));
            };
            let id = MetricId::new(device.as_str(), group.as_str(), name.as_str());
            if id.wildcard_count() > 1 {
                return Err(Error::parse("Cannot have a metric with more than one wildcard"));
            }
            return Ok(QueryNode::metric(id));
        }

        let offsets = match children.get(3) {
            None => Vec::new(),
            Some(node @ ParseNode::RelativeTime { .. }) => vec![self.relative_time(node)?],
            Some(ParseNode::RelativeTimeArray(items)) => items
                .iter()
                .map(|item| self.relative_time(item))
                .collect::<Result<Vec<_>>>()?,
            Some(other) => return Err(Error::parse(format!("Unknown metric argument type: {}", other.kind()))),
        };

        let mut node: Option<QueryNode> = None;
        for device in &devices {
            for group in &groups {
                for name in &names {
                    let source = QueryNode::Source(Source::Metric {
                        id: MetricId::new(device.as_str(), group.as_str(), name.as_str()),
                        offsets: offsets.clone(),
                    });
                    node = Some(match node {
                        None => source,
                        Some(acc) => QueryNode::connector(ConnectorKind::Copy, acc, source),
                    });
                }
            }
        }
        node.ok_or_else(|| Error::parse("A metric field cannot be empty"))
    }

    fn function(&mut self, name: &str, args: Option<&ParseNode>) -> Result<QueryNode> {
        let function = Function::lookup(name, self.kind)?;
        let args = match args {
            None => Vec::new(),
            Some(ParseNode::ArgumentList(items)) => items
                .iter()
                .map(|item| self.argument(item))
                .collect::<Result<Vec<_>>>()?,
            Some(other) => return Err(Error::parse(format!("Expected arguments, found {}", other.kind()))),
        };

        let call = FunctionCall::new(function, args);
        call.validate()?;
        Ok(QueryNode::Function(call))
    }

    fn argument(&mut self, node: &ParseNode) -> Result<Argument> {
        match node {
            ParseNode::StringLiteral(value) => Ok(Argument::String(value.clone())),
            ParseNode::NumberLiteral(image) => Ok(Argument::Number(number(image)?)),
            ParseNode::IntegerLiteral(value) => Ok(Argument::Number(Number::Integer(*value))),
            #[allow(clippy::cast_precision_loss)]
            ParseNode::PercentLiteral(percent) => Ok(Argument::Percent(*percent as f64 / 100.0)),
            ParseNode::BooleanLiteral(value) => Ok(Argument::Boolean(*value)),
            ParseNode::RelativeTime { .. } => Ok(Argument::RelativeTime(self.relative_time(node)?)),
            other => Err(Error::parse(format!("Unknown argument type: {}", other.kind()))),
        }
    }

    fn relative_time(&self, node: &ParseNode) -> Result<RelativeTime> {
        let ParseNode::RelativeTime { negative, amount, unit } = node else {
            return Err(Error::parse(format!("Expected a relative time, found {}", node.kind())));
        };

        let unit = TimeUnit::from_suffix(unit)?;
        let amount = if *negative { -amount } else { *amount };
        let time = RelativeTime::new(amount, unit)?;

        if self.kind == QueryKind::Alert {
            if time.is_negative() {
                return Err(Error::parse("Relative times cannot be negative in alert queries."));
            }
            if unit != TimeUnit::Minutes {
                return Err(Error::parse("Only minutes are allowed for alert durations."));
            }
            if amount >= MAX_ALERT_MINUTES {
                return Err(Error::parse("Alert durations must be less than 60 minutes."));
            }
        }
        Ok(time)
    }

    fn trigger(&self, node: &ParseNode) -> Result<TriggerExpression> {
        let ParseNode::Trigger { conditions, duration } = node else {
            return Err(Error::parse(format!("Expected a trigger, found {}", node.kind())));
        };

        let mut items = conditions.iter();
        let mut trigger = TriggerExpression::new(condition(&mut items)?);
        while let Some(item) = items.next() {
            let ParseNode::Conjunction(token) = item else {
                return Err(Error::parse(format!("Expected a conjunction, found {}", item.kind())));
            };
            let conjunction = Conjunction::from_token(token)?;
            trigger = trigger.join(conjunction, condition(&mut items)?);
        }

        if let Some(duration) = duration {
            trigger = trigger.with_duration(self.relative_time(duration)?.millis());
        }
        Ok(trigger)
    }

    /// Query window in milliseconds, start rounded down and end rounded up to the minute
    fn window(&self, start: &ParseNode, end: Option<&ParseNode>) -> Result<(i64, i64)> {
        let now = self.now.timestamp_millis();
        let today = self.now.with_timezone(&self.offset).date_naive();

        let start = match start {
            ParseNode::AbsoluteTime { .. } => self.at(today, time_of_day(start)?)?,
            other => self.time_point(other, now)?,
        };
        let end = match end {
            None => now,
            Some(node @ ParseNode::AbsoluteTime { .. }) => {
                let start_date = self.datetime(start)?.date_naive();
                self.at(start_date, time_of_day(node)?)?
            }
            Some(other) => self.time_point(other, now)?,
        };

        let (start, end) = (round_down(start, MS_PER_MINUTE), round_up(end, MS_PER_MINUTE));
        if start >= end {
            return Err(Error::parse(format!(
                "Start time must be before end time ({} >= {})",
                self.datetime(start)?.format("%Y-%m-%d %H:%M"),
                self.datetime(end)?.format("%Y-%m-%d %H:%M")
            )));
        }
        Ok((start, end))
    }

    fn time_point(&self, node: &ParseNode, now: i64) -> Result<i64> {
        match node {
            ParseNode::RelativeTime { .. } => {
                let time = self.relative_time(node)?;
                if !time.is_negative() {
                    return Err(Error::parse(format!("Invalid relative time, must be negative {time}")));
                }
                Ok(now + time.millis())
            }
            ParseNode::AbsoluteDate { year, month, day, time } => {
                let date = calendar_date(*year, *month, *day)?;
                self.at(date, time_of_day(time)?)
            }
            other => Err(Error::parse(format!("Expected a time, found {}", other.kind()))),
        }
    }

    fn at(&self, date: NaiveDate, time: NaiveTime) -> Result<i64> {
        self.offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.timestamp_millis())
            .ok_or_else(|| Error::parse(format!("Invalid date: {date} {time}")))
    }

    fn datetime(&self, ms: i64) -> Result<DateTime<FixedOffset>> {
        DateTime::<Utc>::from_timestamp_millis(ms)
            .map(|dt| dt.with_timezone(&self.offset))
            .ok_or_else(|| Error::parse(format!("Time out of range: {ms}")))
    }
}

/// Skip expression and math wrappers that hold a single child
fn unwrap_single(mut node: &ParseNode) -> &ParseNode {
    loop {
        match node {
            ParseNode::Expression(children) | ParseNode::Math { children, .. } if children.len() == 1 => {
                node = &children[0];
            }
            _ => return node,
        }
    }
}

fn number(image: &str) -> Result<Number> {
    let invalid = || Error::parse(format!("Invalid number: {image}"));
    if image.contains('.') {
        image.parse().map(Number::Float).map_err(|_| invalid())
    } else {
        image.parse().map(Number::Integer).map_err(|_| invalid())
    }
}

fn condition<'a>(items: &mut impl Iterator<Item = &'a ParseNode>) -> Result<Condition> {
    let comparator = match items.next() {
        Some(ParseNode::Comparator(token)) => Comparator::from_token(token)?,
        Some(other) => return Err(Error::parse(format!("Expected a comparator, found {}", other.kind()))),
        None => return Err(Error::parse("Trigger is missing a comparator")),
    };
    let target = match items.next() {
        Some(ParseNode::NumberLiteral(image)) => number(image)?.as_f64(),
        #[allow(clippy::cast_precision_loss)]
        Some(ParseNode::IntegerLiteral(value)) => *value as f64,
        Some(other) => return Err(Error::parse(format!("Expected a number, found {}", other.kind()))),
        None => return Err(Error::parse(format!("Comparator {comparator} is missing its value"))),
    };
    Ok(Condition::new(comparator, target))
}

/// Values of one metric field; a list may not mix wildcards and literals
fn field_values(node: &ParseNode) -> Result<Vec<String>> {
    let values = match node {
        ParseNode::StringLiteral(value) => vec![value.trim().to_string()],
        ParseNode::StringArray(items) => items
            .iter()
            .map(|item| match item {
                ParseNode::StringLiteral(value) => Ok(value.trim().to_string()),
                other => Err(Error::parse(format!("Expected a string, found {}", other.kind()))),
            })
            .collect::<Result<Vec<_>>>()?,
        other => return Err(Error::parse(format!("Error not a string: {}", other.kind()))),
    };

    if values.len() > 1 && values.iter().any(|v| v.contains(WILDCARD)) {
        return Err(Error::parse("Cannot mix literals and wildcards"));
    }
    Ok(values)
}

fn calendar_date(year: i64, month: i64, day: i64) -> Result<NaiveDate> {
    if !(1900..3000).contains(&year) {
        return Err(Error::parse(format!("Invalid year: {year}")));
    }
    if !(1..=12).contains(&month) {
        return Err(Error::parse(format!("Invalid month: {month}")));
    }
    if !(1..=31).contains(&day) {
        return Err(Error::parse(format!("Invalid day: {day}")));
    }

    let invalid = || Error::parse(format!("Invalid date: {year}-{month:02}-{day:02}"));
    let year = i32::try_from(year).map_err(|_| invalid())?;
    let month = u32::try_from(month).map_err(|_| invalid())?;
    let day = u32::try_from(day).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

fn time_of_day(node: &ParseNode) -> Result<NaiveTime> {
    let ParseNode::AbsoluteTime { hour, minute, meridiem } = node else {
        return Err(Error::parse(format!("Expected a time of day, found {}", node.kind())));
    };

    if !(0..24).contains(hour) {
        return Err(Error::parse(format!("Invalid hour: {hour}")));
    }
    if !(0..60).contains(minute) {
        return Err(Error::parse(format!("Invalid minute: {minute}")));
    }

    let hour = match meridiem.as_deref() {
        None => *hour,
        Some("am") if *hour == 12 => 0,
        Some("am") => *hour,
        Some("pm") if *hour < 12 => hour + 12,
        Some("pm") => *hour,
        Some(other) => return Err(Error::parse(format!("Unknown time suffix: {other}"))),
    };

    let invalid = || Error::parse(format!("Invalid time: {hour}:{minute:02}"));
    let h = u32::try_from(hour).map_err(|_| invalid())?;
    let m = u32::try_from(*minute).map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(h, m, 0).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parser::parse;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// 2013-01-02 12:00 UTC
    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 1, 2, 12, 0, 0).unwrap()
    }

    fn graph(text: &str) -> Result<GraphQuery> {
        TreeBuilder::new(QueryKind::Graph, noon(), FixedOffset::east_opt(0).unwrap()).graph_query(&parse(text)?)
    }

    fn alert(text: &str) -> Result<AlertQuery> {
        TreeBuilder::new(QueryKind::Alert, noon(), FixedOffset::east_opt(0).unwrap()).alert_query(&parse(text)?)
    }

    fn load(device: &str) -> QueryNode {
        QueryNode::metric(MetricId::new(device, "cpu", "load"))
    }

    fn call(function: Function, args: Vec<Argument>) -> QueryNode {
        QueryNode::Function(FunctionCall::new(function, args))
    }

    #[test]
    fn test_relative_window() {
        let query = graph(r#"-1h m("host1", "cpu", "load")"#).unwrap();
        let now = noon().timestamp_millis();
        assert_eq!(query.start_time(), now - 60 * MS_PER_MINUTE);
        assert_eq!(query.end_time(), now);
        assert_eq!(query.root().left(), Some(&load("host1")));
    }

    #[test]
    fn test_connector_chain_folds_left() {
        let query = graph(r#"-1h m("host1", "cpu", "load") >| avg(5) | histo"#).unwrap();
        let expected = QueryNode::connector(
            ConnectorKind::Pipe,
            QueryNode::connector(
                ConnectorKind::Copy,
                load("host1"),
                call(Function::Average, vec![Argument::Number(Number::Integer(5))]),
            ),
            call(Function::Render(crate::functions::RenderKind::Histogram), Vec::new()),
        );
        assert_eq!(query.root(), &expected);
    }

    #[test]
    fn test_juxtaposed_metrics_are_copied() {
        let query = graph(r#"-1h m("a", "cpu", "load") m("b", "cpu", "load") graph"#).unwrap();
        let expected = QueryNode::connector(
            ConnectorKind::Copy,
            QueryNode::connector(ConnectorKind::Copy, load("a"), load("b")),
            call(Function::Render(crate::functions::RenderKind::Line), Vec::new()),
        );
        assert_eq!(query.root(), &expected);
    }

    #[test]
    fn test_math_constants_are_numbered() {
        let query = graph(r#"-1h (m("a", "cpu", "load") + 2) * 3"#).unwrap();
        let expected = QueryNode::math(
            MathOp::Multiply,
            QueryNode::math(MathOp::Add, load("a"), QueryNode::constant(2.0, 1)),
            QueryNode::constant(3.0, 2),
        );
        assert_eq!(query.root().left(), Some(&expected));
    }

    #[test]
    fn test_metric_lists_expand_with_offsets() {
        let query = graph(r#"-1h m(["a", "b"], "cpu", "load", [-1d, -1w])"#).unwrap();
        let offsets = vec![
            RelativeTime::new(-1, TimeUnit::Days).unwrap(),
            RelativeTime::new(-1, TimeUnit::Weeks).unwrap(),
        ];
        let source = |device: &str| {
            QueryNode::Source(Source::Metric {
                id: MetricId::new(device, "cpu", "load"),
                offsets: offsets.clone(),
            })
        };
        assert_eq!(
            query.root().left(),
            Some(&QueryNode::connector(ConnectorKind::Copy, source("a"), source("b")))
        );
    }

    #[test]
    fn test_absolute_window() {
        let query = graph(r#"2013-01-02 6:30am to 10:15am m("a", "cpu", "load")"#).unwrap();
        let day = Utc.with_ymd_and_hms(2013, 1, 2, 0, 0, 0).unwrap().timestamp_millis();
        assert_eq!(query.start_time(), day + (6 * 60 + 30) * MS_PER_MINUTE);
        assert_eq!(query.end_time(), day + (10 * 60 + 15) * MS_PER_MINUTE);
    }

    #[test]
    fn test_time_of_day_uses_offset() {
        // 12:00 UTC is 07:00 at UTC-5, so 6:00am is today there
        let builder = TreeBuilder::new(QueryKind::Graph, noon(), FixedOffset::west_opt(5 * 3600).unwrap());
        let query = builder.graph_query(&parse(r#"6:00am m("a", "cpu", "load")"#).unwrap()).unwrap();
        let expected = Utc.with_ymd_and_hms(2013, 1, 2, 11, 0, 0).unwrap().timestamp_millis();
        assert_eq!(query.start_time(), expected);
    }

    #[rstest]
    #[case(r#"-1h m("a", "cpu")"#, "A metric must have at least 3 arguments (device, group, name), had 2")]
    #[case(r#"-1h m(["a", "*"], "cpu", "load")"#, "Cannot mix literals and wildcards")]
    #[case(r#"-1h m("a", "cpu", "load") | predict"#, "predict is not a valid function name")]
    #[case(r#"-1h m("a", "cpu", "load") | deriv(2)"#, "deriv does not take arguments")]
    #[case(r#"30m m("a", "cpu", "load")"#, "Invalid relative time, must be negative 30m")]
    #[case(r#"-0m m("a", "cpu", "load")"#, "Duration cannot be zero")]
    #[case(r#"2013-13-02 6:30 m("a", "cpu", "load")"#, "Invalid month: 13")]
    #[case(r#"2013-02-30 6:30 m("a", "cpu", "load")"#, "Invalid date: 2013-02-30")]
    #[case(r#"1800-01-02 6:30 m("a", "cpu", "load")"#, "Invalid year: 1800")]
    #[case(r#"2013-01-02 25:30 m("a", "cpu", "load")"#, "Invalid hour: 25")]
    #[case(r#"m("a", "cpu", "load") > 1 do page"#, "This is an alert query, not a graph query")]
    fn test_graph_errors(#[case] text: &str, #[case] message: &str) {
        assert_eq!(graph(text).unwrap_err().to_string(), message);
    }

    #[test]
    fn test_start_must_precede_end() {
        let err = graph(r#"-1h to -2h m("a", "cpu", "load")"#).unwrap_err();
        assert!(err.to_string().starts_with("Start time must be before end time"));
    }

    #[test]
    fn test_alert_query() {
        let query = alert(r#"m("host1", "cpu", "load") > 0.9 for 5m do page"#).unwrap();
        assert_eq!(query.metric_id(), &MetricId::new("host1", "cpu", "load"));
        assert_eq!(query.trigger().duration_ms(), 5 * MS_PER_MINUTE);
        assert_eq!(query.trigger().condition(), &Condition::new(Comparator::GreaterThan, 0.9));
        assert_eq!(query.action_name(), "page");
    }

    #[test]
    fn test_alert_compound_trigger() {
        let query = alert(r#"m("host1", "cpu", "load") > 1 and < 5 do page"#).unwrap();
        assert!(query.trigger().is_satisfied(3.0));
        assert!(!query.trigger().is_satisfied(6.0));
    }

    #[rstest]
    #[case(r#"m("a", "cpu") > 1 do page"#, "A metric must have 3 arguments (device, group, name), had 2")]
    #[case(r#"m("a", "cpu", "load", -1d) > 1 do page"#, "A metric in an alert query cannot have an overlay time")]
    #[case(r#"m(["a", "b"], "cpu", "load") > 1 do page"#, "Cannot specify more than one metric in an alert query")]
    #[case(r#"m("*", "*", "load") > 1 do page"#, "Cannot have a metric with more than one wildcard")]
    #[case(r#"m("a", "cpu", "load") | avg > 1 do page"#, "Alert queries do not support connectors")]
    #[case(r#"m("a", "cpu", "load") + m("b", "cpu", "load") > 1 do page"#, "Alert queries can only contain one metric")]
    #[case(r#"m("a", "cpu", "load") > 1 for 2h do page"#, "Only minutes are allowed for alert durations.")]
    #[case(r#"m("a", "cpu", "load") > 1 for 60m do page"#, "Alert durations must be less than 60 minutes.")]
    #[case(r#"-1h m("a", "cpu", "load")"#, "This is a graph query, not an alert query")]
    fn test_alert_errors(#[case] text: &str, #[case] message: &str) {
        assert_eq!(alert(text).unwrap_err().to_string(), message);
    }

    #[test]
    fn test_builds_external_trees() {
        let tree = ParseNode::AlertQuery {
            expression: Box::new(ParseNode::Metric(vec![
                ParseNode::string(" host1 "),
                ParseNode::string("cpu"),
                ParseNode::string("load"),
            ])),
            trigger: Box::new(ParseNode::Trigger {
                conditions: vec![ParseNode::Comparator("<".into()), ParseNode::IntegerLiteral(2)],
                duration: Some(Box::new(ParseNode::relative(true, 5, "m"))),
            }),
            action: "page".into(),
        };
        let builder = || TreeBuilder::new(QueryKind::Alert, noon(), FixedOffset::east_opt(0).unwrap());
        assert_eq!(
            builder().alert_query(&tree).unwrap_err().to_string(),
            "Relative times cannot be negative in alert queries."
        );

        let ParseNode::AlertQuery { expression, .. } = tree else {
            unreachable!()
        };
        let tree = ParseNode::AlertQuery {
            expression,
            trigger: Box::new(ParseNode::Trigger {
                conditions: vec![ParseNode::Comparator("=".into()), ParseNode::IntegerLiteral(2)],
                duration: None,
            }),
            action: "page".into(),
        };
        assert_eq!(
            builder().alert_query(&tree).unwrap_err().to_string(),
            "Unknown comparator = did you mean ==?"
        );
    }
}
