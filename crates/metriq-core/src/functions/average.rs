//! `avg`: mean over the whole series, over every `n` points, or over time runs

use tracing::debug;

use super::{empty_like, mean, Function};
use crate::error::{Error, Result};
use crate::models::MetricValue;
use crate::query::Argument;
use crate::series::{MetricValueList, SeriesMap};

pub(super) fn average(args: &[Argument], input: SeriesMap) -> Result<SeriesMap> {
    let chunk = chunk_size(args)?;

    let mut ret = SeriesMap::new();
    for (id, values) in input {
        let new_id = id.with_label(Function::Average.name());
        if values.is_empty() {
            debug!(metric = %id, "No metrics found");
            ret.insert(new_id, empty_like(&values)?);
            continue;
        }

        let aggregated = match (args.first(), chunk) {
            (_, Some(n)) => values.aggregate_by_values_in_aggregation(n, mean),
            (Some(Argument::RelativeTime(window)), None) => {
                values.aggregate_by_time(window.millis().abs(), mean)
            }
            _ => with_ending_value(values.aggregate_by_values_in_aggregation(values.size(), mean), &values),
        };

        debug!(metric = %id, from = values.size(), to = aggregated.len(), "Averaged series");
        ret.insert(new_id, MetricValueList::from_values(aggregated)?);
    }

    Ok(ret)
}

/// Points per average when a count is given; `None` averages the whole series or by time
pub(super) fn chunk_size(args: &[Argument]) -> Result<Option<usize>> {
    if args.len() > 1 {
        return Err(Error::parse("Too many arguments for average function"));
    }

    match args.first() {
        Some(Argument::Number(n)) => Ok(Some(
            usize::try_from(n.as_i64())
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| Error::parse("Average window must be at least one point"))?,
        )),
        Some(Argument::RelativeTime(_)) | None => Ok(None),
        Some(_) => Err(Error::parse("Unknown argument passed to average")),
    }
}

/// Reduce every series to about `total_points` averaged samples.
///
/// Used to keep rendered graphs within their point budget. The last average
/// is repeated at the series' last timestamp so the line reaches the end of
/// the data.
pub fn average_to_points(input: SeriesMap, total_points: usize) -> Result<SeriesMap> {
    let mut ret = SeriesMap::new();
    for (id, values) in input {
        let new_id = id.with_label(Function::Average.name());
        if values.is_empty() {
            ret.insert(new_id, empty_like(&values)?);
            continue;
        }

        let aggregated = with_ending_value(values.aggregate_by_values_in_result(total_points, mean), &values);
        ret.insert(new_id, MetricValueList::from_values(aggregated)?);
    }
    Ok(ret)
}

fn with_ending_value(mut aggregated: Vec<MetricValue>, values: &MetricValueList) -> Vec<MetricValue> {
    if let (Some(tail), Some(last)) = (aggregated.last(), values.last()) {
        let mut ending = tail.clone();
        ending.timestamp = last.timestamp;
        aggregated.push(ending);
    }
    aggregated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{context, id, per_minute};
    use crate::query::{Number, RelativeTime, TimeUnit};
    use crate::time::MS_PER_MINUTE;
    use pretty_assertions::assert_eq;

    fn thirty_samples() -> SeriesMap {
        #[allow(clippy::cast_precision_loss)]
        let values: Vec<f64> = (0..30).map(|v| v as f64).collect();
        context(vec![(id("host1"), per_minute(&values))])
    }

    #[test]
    fn test_average_every_five_points() {
        let result = average(&[Argument::Number(Number::Integer(5))], thirty_samples()).unwrap();

        let list = result.get(&id("host1").with_label("avg")).unwrap();
        assert_eq!(list.double_values(), vec![2.0, 7.0, 12.0, 17.0, 22.0, 27.0]);
        assert_eq!(list.first().unwrap().timestamp, 0);
        assert_eq!(list.last().unwrap().timestamp, 25 * MS_PER_MINUTE);
    }

    #[test]
    fn test_average_whole_series_adds_ending_value() {
        let result = average(&[], thirty_samples()).unwrap();

        let list = result.values().next().unwrap();
        assert_eq!(list.double_values(), vec![14.5, 14.5]);
        assert_eq!(list.last().unwrap().timestamp, 29 * MS_PER_MINUTE);
    }

    #[test]
    fn test_average_by_time() {
        let window = RelativeTime::new(10, TimeUnit::Minutes).unwrap();
        let result = average(&[Argument::RelativeTime(window)], thirty_samples()).unwrap();
        assert_eq!(result.values().next().unwrap().double_values(), vec![4.5, 14.5, 24.5]);
    }

    #[test]
    fn test_average_argument_errors() {
        let two = vec![Argument::Boolean(true), Argument::Boolean(false)];
        assert_eq!(
            average(&two, thirty_samples()).unwrap_err().to_string(),
            "Too many arguments for average function"
        );
        assert_eq!(
            average(&[Argument::String("x".into())], thirty_samples())
                .unwrap_err()
                .to_string(),
            "Unknown argument passed to average"
        );
        assert!(average(&[Argument::Number(Number::Integer(0))], thirty_samples()).is_err());
    }

    #[test]
    fn test_empty_series_stays_empty() {
        let empty = crate::functions::test_support::list(&[]);
        let result = average(&[], context(vec![(id("host1"), empty)])).unwrap();
        assert!(result.get(&id("host1").with_label("avg")).unwrap().is_empty());
    }

    #[test]
    fn test_average_to_points() {
        let result = average_to_points(thirty_samples(), 3).unwrap();
        let list = result.values().next().unwrap();
        assert_eq!(list.double_values(), vec![4.5, 14.5, 24.5, 24.5]);
    }
}
