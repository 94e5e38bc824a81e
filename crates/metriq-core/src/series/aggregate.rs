//! Aggregation operators over the stored samples

use super::MetricValueList;
use crate::models::MetricValue;

impl MetricValueList {
    /// Aggregate runs of samples spanning less than `duration_ms`.
    ///
    /// A run keeps growing while `time[j] - time[run_start] < duration_ms`;
    /// the sample that breaks the condition starts the next run. The last run
    /// is always flushed, so a one-sample list yields exactly one call.
    pub fn aggregate_by_time<F>(&self, duration_ms: i64, mut f: F) -> Vec<MetricValue>
    where
        F: FnMut(&[MetricValue]) -> MetricValue,
    {
        let values = self.values();
        if values.is_empty() {
            return Vec::new();
        }

        let mut ret = Vec::new();
        let mut run_start = 0;

        for cur in 1..values.len() {
            if values[cur].timestamp - values[run_start].timestamp >= duration_ms {
                ret.push(f(&values[run_start..cur]));
                run_start = cur;
            }
        }
        ret.push(f(&values[run_start..]));

        ret
    }

    /// Aggregate consecutive chunks of `k` samples; the last chunk may be shorter
    pub fn aggregate_by_values_in_aggregation<F>(&self, k: usize, f: F) -> Vec<MetricValue>
    where
        F: FnMut(&[MetricValue]) -> MetricValue,
    {
        self.values().chunks(k.max(1)).map(f).collect()
    }

    /// Aggregate into roughly `n` results using chunks of `ceil(size / n)` samples
    pub fn aggregate_by_values_in_result<F>(&self, n: usize, mut f: F) -> Vec<MetricValue>
    where
        F: FnMut(&[MetricValue]) -> MetricValue,
    {
        let values = self.values();
        if values.is_empty() {
            return Vec::new();
        }

        let k = if n == 0 { 0 } else { values.len().div_ceil(n) };
        if k == 0 {
            return vec![f(values)];
        }

        self.aggregate_by_values_in_aggregation(k, f)
    }
}
