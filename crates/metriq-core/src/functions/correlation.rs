//! `corr`: find stored metrics that move together with the input series

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use super::{empty_like, Function, FunctionContext};
use crate::error::{Error, Result};
use crate::models::MetricId;
use crate::series::{fill_in_missing_values, MetricValueList, SeriesMap};
use crate::store::MetricRequest;
use crate::time::MS_PER_MINUTE;

pub(super) fn correlation(ctx: &FunctionContext<'_>, input: SeriesMap) -> Result<SeriesMap> {
    if input.is_empty() {
        warn!("No metrics to correlate");
        return Ok(input);
    }

    let config = ctx.evaluator.config();
    let max_span = i64::try_from(config.correlation_max_span.as_millis()).unwrap_or(i64::MAX);
    if ctx.end - ctx.start > max_span {
        warn!(span = ctx.end - ctx.start, "Time range too large for correlation");
        return Err(Error::parse(format!(
            "Time span too large, please limit to {} minutes when computing correlations",
            max_span / MS_PER_MINUTE - 1
        )));
    }

    let candidates = candidates(ctx, &input)?;

    let mut ret = SeriesMap::new();
    for (id, values) in input {
        if values.is_empty() {
            debug!(metric = %id, "No metrics found");
            ret.insert(id, empty_like(&values)?);
            continue;
        }

        for (candidate_id, candidate) in candidates.iter() {
            let correlated = correlation_with_time_shift(&values, candidate)?;
            if correlated.abs() > config.correlation_threshold {
                debug!(metric = %id, candidate = %candidate_id, correlated, "Correlated metrics");
                ret.insert(candidate_id.with_label(Function::Correlation.name()), candidate.clone());
            }
        }
        ret.insert(id, values);
    }

    Ok(ret)
}

/// Every stored metric not already in the input, read over the query window
fn candidates(ctx: &FunctionContext<'_>, input: &SeriesMap) -> Result<SeriesMap> {
    let present: HashSet<MetricId> = input.keys().map(MetricId::unlabelled).collect();
    let requests: Vec<MetricRequest> = ctx
        .evaluator
        .metadata()
        .read_metric_ids()?
        .into_iter()
        .filter(|id| !present.contains(id))
        .map(|id| MetricRequest::new(id, ctx.start, ctx.end))
        .collect();

    ctx.evaluator.reader().read_metrics(&requests)
}

/// Best Pearson correlation of `lhs` against `rhs` shifted back by a half, a third, or not at all.
///
/// Both series are first resampled onto the union of their timestamps. The
/// result with the largest magnitude wins; flat series correlate as `0`.
pub fn correlation_with_time_shift(lhs: &MetricValueList, rhs: &MetricValueList) -> Result<f64> {
    if lhs.size() < 2 || rhs.size() < 2 {
        return Ok(0.0);
    }

    let times: BTreeSet<i64> = lhs
        .values()
        .iter()
        .chain(rhs.values())
        .map(|v| v.timestamp)
        .collect();
    let lhs = fill_in_missing_values(lhs, &times, true)?.double_values();
    let rhs = fill_in_missing_values(rhs, &times, true)?.double_values();
    let len = lhs.len().min(rhs.len());

    let half = pearson(&lhs[len / 2..len], &rhs[..len.div_ceil(2)]);
    let third = pearson(&lhs[len / 3..len], &rhs[..(2 * len).div_ceil(3)]);
    let whole = pearson(&lhs[..len], &rhs[..len]);

    Ok([half, third, whole]
        .into_iter()
        .flatten()
        .map(|c| if c.is_nan() { 0.0 } else { c })
        .fold(0.0, |best: f64, c| if c.abs() > best.abs() { c } else { best }))
}

/// Pearson correlation coefficient; `None` when the samples differ in length or have fewer than two points
#[allow(clippy::cast_precision_loss)]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    Some(cov / (var_x * var_y).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{context, evaluator, id, per_minute};
    use crate::models::Metric;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pearson() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-9);

        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-9);

        assert!(pearson(&[1.0], &[1.0]).is_none());
        assert!(pearson(&[1.0, 1.0], &[1.0, 2.0]).unwrap().is_nan());
    }

    #[test]
    fn test_shifted_correlation_finds_lag() {
        // rhs repeats lhs half a window later
        let lhs = per_minute(&[0.0, 0.0, 0.0, 0.0, 1.0, 5.0, 2.0, 8.0]);
        let rhs = per_minute(&[1.0, 5.0, 2.0, 8.0, 3.0, 3.0, 3.0, 3.0]);
        let r = correlation_with_time_shift(&lhs, &rhs).unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_series_do_not_correlate() {
        let flat = per_minute(&[1.0, 1.0, 1.0, 1.0]);
        let other = per_minute(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(correlation_with_time_shift(&flat, &other).unwrap(), 0.0);
    }

    fn store_metrics() -> Vec<Metric> {
        let mut metrics = Vec::new();
        for m in 0..10 {
            #[allow(clippy::cast_precision_loss)]
            let v = m as f64;
            metrics.push(Metric::new(id("host1"), m * MS_PER_MINUTE, v, ""));
            metrics.push(Metric::new(id("host2"), m * MS_PER_MINUTE, 3.0 * v + 1.0, ""));
            metrics.push(Metric::new(id("noise"), m * MS_PER_MINUTE, if m % 2 == 0 { 1.0 } else { -1.0 }, ""));
        }
        metrics
    }

    #[test]
    fn test_correlation_adds_related_metrics() {
        let evaluator = evaluator(&store_metrics());
        let ctx = FunctionContext {
            evaluator: &evaluator,
            start: 0,
            end: 9 * MS_PER_MINUTE,
        };
        let input = context(vec![(
            id("host1"),
            evaluator.reader().read_metric(&id("host1"), 0, 9 * MS_PER_MINUTE).unwrap(),
        )]);

        let result = correlation(&ctx, input).unwrap();
        let ids: Vec<&MetricId> = result.keys().collect();
        assert_eq!(ids, vec![&id("host2").with_label("corr"), &id("host1")]);
    }

    #[test]
    fn test_correlation_window_limit() {
        let evaluator = evaluator(&store_metrics());
        let ctx = FunctionContext {
            evaluator: &evaluator,
            start: 0,
            end: 32 * MS_PER_MINUTE,
        };
        let input = context(vec![(id("host1"), per_minute(&[1.0, 2.0]))]);
        assert_eq!(
            correlation(&ctx, input).unwrap_err().to_string(),
            "Time span too large, please limit to 30 minutes when computing correlations"
        );
    }
}
