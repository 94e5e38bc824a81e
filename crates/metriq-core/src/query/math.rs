//! Element-wise arithmetic over several series

use std::collections::BTreeSet;

use tracing::debug;

use super::node::MathOp;
use crate::error::{Error, Result};
use crate::models::{MetricId, MetricValue};
use crate::series::{fill_in_missing_values, MetricValueList, SeriesMap};

/// Combine `operands` element-wise, left to right.
///
/// Empty operands are dropped. The rest are resampled onto the union of their
/// timestamps (gaps averaged, or zeroed when `use_average` is false) so that
/// every operand has a sample at every time.
pub fn combine(op: MathOp, operands: Vec<(MetricId, MetricValueList)>, use_average: bool) -> Result<SeriesMap> {
    let operands: Vec<(MetricId, MetricValueList)> =
        operands.into_iter().filter(|(_, list)| !list.is_empty()).collect();

    if operands.is_empty() {
        debug!(op = %op.symbol(), "No values to combine");
        return Ok(SeriesMap::new());
    }

    let times: BTreeSet<i64> = operands
        .iter()
        .flat_map(|(_, list)| list.values().iter().map(|v| v.timestamp))
        .collect();

    let normalized = operands
        .iter()
        .map(|(_, list)| fill_in_missing_values(list, &times, use_average))
        .collect::<Result<Vec<_>>>()?;

    let (first, rest) = normalized
        .split_first()
        .ok_or_else(|| Error::invariant("No operands after normalization"))?;

    let mut combined = Vec::with_capacity(times.len());
    for (i, head) in first.values().iter().enumerate() {
        let mut acc = head.value;
        let mut current = head;
        for list in rest {
            current = list
                .values()
                .get(i)
                .ok_or_else(|| Error::invariant(format!("Operand is missing sample {i}")))?;
            acc = op.apply(acc, current.value);
        }
        combined.push(MetricValue::new(current.timestamp, acc, current.units.clone()));
    }

    let ids: Vec<&MetricId> = operands.iter().map(|(id, _)| id).collect();
    let mut result = SeriesMap::new();
    result.insert(combine_ids(&ids, op), MetricValueList::from_values(combined)?);
    Ok(result)
}

/// Id of a combined series: each field joins the operands' distinct values with the operator
pub fn combine_ids(ids: &[&MetricId], op: MathOp) -> MetricId {
    if let [single] = ids {
        return (*single).clone();
    }

    let separator = op.symbol().to_string();
    let join = |field: fn(&MetricId) -> &str| {
        let mut seen: Vec<&str> = Vec::new();
        for id in ids {
            let value = field(id);
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen.join(&separator)
    };

    MetricId::new(
        join(|id| id.device.as_str()),
        join(|id| id.group.as_str()),
        join(|id| id.name.as_str()),
    )
}
