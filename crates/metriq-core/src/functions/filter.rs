//! `filter`: drop series stuck at one of the given values

use super::Function;
use crate::error::{Error, Result};
use crate::query::Argument;
use crate::series::{MetricValueList, SeriesMap};

pub(super) fn filter(args: &[Argument], input: SeriesMap) -> Result<SeriesMap> {
    let excluded = excluded_values(args)?;

    let mut ret = SeriesMap::new();
    for (id, values) in input {
        let excluded_constant = constant_value(&values).is_some_and(|c| excluded.contains(&c));
        if !excluded_constant {
            ret.insert(id.with_label(Function::Filter.name()), values);
        }
    }
    Ok(ret)
}

pub(super) fn excluded_values(args: &[Argument]) -> Result<Vec<f64>> {
    args.iter()
        .map(|arg| match arg {
            Argument::Number(n) => Ok(n.as_f64()),
            _ => Err(Error::parse("Filter arguments must be numbers")),
        })
        .collect()
}

/// The value every sample shares, if there is one
fn constant_value(values: &MetricValueList) -> Option<f64> {
    let first = values.first()?.value;
    values
        .values()
        .iter()
        .all(|v| v.value == first)
        .then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{context, id, per_minute};
    use crate::query::Number;

    #[test]
    fn test_filter_drops_constant_series() {
        let input = context(vec![
            (id("zero"), per_minute(&[0.0, 0.0, 0.0])),
            (id("busy"), per_minute(&[0.0, 1.0, 0.0])),
            (id("flat"), per_minute(&[5.0, 5.0])),
        ]);
        let result = filter(&[Argument::Number(Number::Integer(0))], input).unwrap();

        let devices: Vec<&str> = result.keys().map(|id| id.device.as_str()).collect();
        assert_eq!(devices, vec!["busy", "flat"]);
    }

    #[test]
    fn test_filter_rejects_non_numbers() {
        let err = filter(&[Argument::Boolean(true)], SeriesMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "Filter arguments must be numbers");
    }
}
