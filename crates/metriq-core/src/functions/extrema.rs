//! `min` and `max`: a flat line at the extreme value across the series' span

use super::Function;
use crate::error::Result;
use crate::series::{MetricValueList, SeriesMap};

pub(super) fn extreme(function: Function, input: SeriesMap) -> Result<SeriesMap> {
    let pick: fn(f64, f64) -> f64 = if function == Function::Min { f64::min } else { f64::max };

    let mut ret = SeriesMap::new();
    for (id, values) in input {
        let (Some(first), Some(last)) = (values.first(), values.last()) else {
            continue;
        };

        let extreme = values
            .values()
            .iter()
            .map(|v| v.value)
            .reduce(pick)
            .unwrap_or(first.value);

        let line = vec![first.with_value(extreme), last.with_value(extreme)];
        ret.insert(id.with_label(function.name()), MetricValueList::from_values(line)?);
    }

    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{context, id, list};
    use crate::time::MS_PER_MINUTE;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_min_and_max() {
        let series = list(&[(1, 3.0), (2, -1.0), (4, 7.0)]);

        let min = extreme(Function::Min, context(vec![(id("h"), series.clone())])).unwrap();
        let min = min.get(&id("h").with_label("min")).unwrap();
        assert_eq!(min.double_values(), vec![-1.0, -1.0]);
        assert_eq!(min.first().unwrap().timestamp, MS_PER_MINUTE);
        assert_eq!(min.last().unwrap().timestamp, 4 * MS_PER_MINUTE);

        let max = extreme(Function::Max, context(vec![(id("h"), series)])).unwrap();
        assert_eq!(max.values().next().unwrap().double_values(), vec![7.0, 7.0]);
    }

    #[test]
    fn test_empty_series_dropped() {
        let result = extreme(Function::Max, context(vec![(id("h"), list(&[]))])).unwrap();
        assert!(result.is_empty());
    }
}
