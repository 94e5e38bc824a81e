//! `deriv` and `int`: per-minute rate of change and trapezoid area

use tracing::debug;

use super::{empty_like, rebuild, Function};
use crate::error::Result;
use crate::models::MetricValue;
use crate::series::SeriesMap;
use crate::time::ms_to_minutes;

pub(super) fn derivative(input: SeriesMap) -> Result<SeriesMap> {
    pairwise(Function::Derivative, input, |minutes, lhs, rhs| (rhs - lhs) / minutes)
}

pub(super) fn integral(input: SeriesMap) -> Result<SeriesMap> {
    pairwise(Function::Integral, input, |minutes, lhs, rhs| {
        let square = minutes * lhs.min(rhs);
        let triangle = minutes * (lhs - rhs).abs() / 2.0;
        square + triangle
    })
}

/// Apply `f(minutes_between, value, next_value)` to each consecutive pair,
/// stamping the result at the earlier sample
fn pairwise<F>(function: Function, input: SeriesMap, f: F) -> Result<SeriesMap>
where
    F: Fn(f64, f64, f64) -> f64,
{
    let mut ret = SeriesMap::new();

    for (id, values) in input {
        let new_id = id.with_label(function.name());
        if values.is_empty() {
            debug!(metric = %id, "No metrics found");
            ret.insert(new_id, empty_like(&values)?);
            continue;
        }

        let computed: Vec<MetricValue> = values
            .values()
            .windows(2)
            .map(|pair| {
                let minutes = ms_to_minutes(pair[1].timestamp - pair[0].timestamp);
                pair[0].with_value(f(minutes, pair[0].value, pair[1].value))
            })
            .collect();

        ret.insert(new_id, rebuild(computed, &values)?);
    }

    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{context, id, list};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_derivative_is_per_minute() {
        let input = context(vec![(id("host1"), list(&[(0, 0.0), (1, 2.0), (3, 8.0)]))]);
        let result = derivative(input).unwrap();

        let out = result.get(&id("host1").with_label("deriv")).unwrap();
        assert_eq!(out.double_values(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_integral_is_trapezoid() {
        let input = context(vec![(id("host1"), list(&[(0, 2.0), (2, 4.0)]))]);
        let result = integral(input).unwrap();

        // 2 minutes * 2 + 2 minutes * 2 / 2
        assert_eq!(result.values().next().unwrap().double_values(), vec![6.0]);
    }

    #[test]
    fn test_single_point_gives_empty_series() {
        let input = context(vec![(id("host1"), list(&[(0, 2.0)]))]);
        let result = derivative(input).unwrap();
        assert!(result.values().next().unwrap().is_empty());
    }
}
