//! Resampling a series onto a set of required timestamps

use std::collections::BTreeSet;

use super::MetricValueList;
use crate::error::{Error, Result};
use crate::models::MetricValue;

/// Return a copy of `list` that has a sample at every time in `required_times`.
///
/// The copy spans the first to the last required time and keeps every known
/// sample in that range. A missing required time `t` is filled from the known
/// samples around it:
///
/// - with `use_average`, before the first known sample it takes the next
///   known value, after the last known sample it takes the last known value,
///   and in between it takes the mean of the two straddling values;
/// - without `use_average` it is `0.0`.
///
/// Units come from the next known sample, or the last one when the gap runs
/// to the end.
pub fn fill_in_missing_values(
    list: &MetricValueList,
    required_times: &BTreeSet<i64>,
    use_average: bool,
) -> Result<MetricValueList> {
    let known = list.values();
    if known.is_empty() {
        return Err(Error::validation("Cannot fill in missing values of an empty list"));
    }
    let (Some(&first), Some(&last)) = (required_times.first(), required_times.last()) else {
        return Err(Error::validation("No required times to fill in"));
    };

    let mut filled: Vec<MetricValue> = known
        .iter()
        .filter(|v| (first..=last).contains(&v.timestamp))
        .cloned()
        .collect();
    let present: BTreeSet<i64> = filled.iter().map(|v| v.timestamp).collect();

    for &time in required_times.difference(&present) {
        let split = known.partition_point(|v| v.timestamp < time);
        let prev = split.checked_sub(1).map(|i| &known[i]);
        let next = known.get(split);

        let (value, units) = match (prev, next, use_average) {
            (None, Some(next), true) => (next.value, &next.units),
            (Some(prev), None, true) => (prev.value, &prev.units),
            (Some(prev), Some(next), true) => ((prev.value + next.value) / 2.0, &next.units),
            (_, Some(next), false) => (0.0, &next.units),
            (Some(prev), None, false) => (0.0, &prev.units),
            (None, None, _) => {
                return Err(Error::invariant(format!("No known sample around {time}")));
            }
        };

        filled.push(MetricValue::new(time, value, units.clone()));
    }

    MetricValueList::from_values(filled)
}
