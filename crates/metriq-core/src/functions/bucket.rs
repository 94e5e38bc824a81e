//! `bucket`: collapse long series into at most `max_points` maxima

use super::Function;
use crate::error::Result;
use crate::models::MetricValue;
use crate::series::{MetricValueList, SeriesMap};

pub(super) fn bucket(max_points: usize, input: SeriesMap) -> Result<SeriesMap> {
    let mut ret = SeriesMap::new();

    for (id, values) in input {
        let new_id = id.with_label(Function::Bucket.name());
        if values.size() <= max_points {
            ret.insert(new_id, values);
            continue;
        }

        let per_bucket = values.size().div_ceil(max_points.max(1));
        // a trailing partial bucket is dropped
        let maxima: Vec<MetricValue> = values
            .values()
            .chunks_exact(per_bucket)
            .map(|chunk| {
                let peak = chunk.iter().map(|v| v.value).fold(f64::NEG_INFINITY, f64::max);
                chunk[chunk.len() - 1].with_value(peak)
            })
            .collect();

        ret.insert(new_id, MetricValueList::from_values(maxima)?);
    }

    Ok(ret)
}
