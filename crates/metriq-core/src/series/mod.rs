//! Bucketed time-series container
//!
//! A [`MetricValueList`] covers a fixed time window split into equal
//! increments. Each bucket holds at most one [`MetricValue`]; empty buckets
//! are gaps. The ascending projection of the non-empty buckets is computed
//! lazily and cached until the next mutation.

mod aggregate;
mod fill;
mod map;

use std::cell::OnceCell;

use tracing::warn;

use crate::error::{Error, Result};
use crate::models::MetricValue;
use crate::time::{ms_to_seconds, round_down, round_down_to_second, MS_PER_SECOND};

pub use fill::fill_in_missing_values;
pub use map::SeriesMap;

/// Default bucket width in seconds
pub const DEFAULT_INCREMENT_SECS: i64 = 60;

/// Fixed-increment array of optional samples
#[derive(Debug, Clone)]
pub struct MetricValueList {
    start_secs: i64,
    end_secs: i64,
    increment_secs: i64,
    buckets: Vec<Option<MetricValue>>,
    size: usize,
    cache: OnceCell<Vec<MetricValue>>,
}

impl MetricValueList {
    /// Empty list covering `[start, end]` (ms) with one-minute buckets
    pub fn new(start: i64, end: i64) -> Result<Self> {
        Self::with_increment(start, end, DEFAULT_INCREMENT_SECS)
    }

    /// Empty list covering `[start, end]` (ms); both bounds are rounded down to the increment
    pub fn with_increment(start: i64, end: i64, increment_secs: i64) -> Result<Self> {
        if end < start {
            return Err(Error::validation(format!(
                "End time {end} is before start time {start}"
            )));
        }
        if increment_secs <= 0 {
            return Err(Error::validation(format!(
                "Increment must be positive, got {increment_secs}"
            )));
        }

        let increment_ms = increment_secs * MS_PER_SECOND;
        Self::from_bounds(
            ms_to_seconds(round_down(start, increment_ms)),
            ms_to_seconds(round_down(end, increment_ms)),
            increment_secs,
        )
    }

    /// Build a list from loose samples.
    ///
    /// The increment is the smallest gap between consecutive timestamps; the
    /// window runs from the first to the last sample. A single sample yields a
    /// one-bucket list. Duplicate timestamps keep the first sample.
    pub fn from_values(values: impl IntoIterator<Item = MetricValue>) -> Result<Self> {
        let mut values: Vec<MetricValue> = values
            .into_iter()
            .map(|mut v| {
                v.timestamp = round_down_to_second(v.timestamp);
                v
            })
            .collect();

        if values.is_empty() {
            return Err(Error::validation("Cannot build a metric list from no values"));
        }

        values.sort_by_key(|v| v.timestamp);
        let before = values.len();
        values.dedup_by_key(|v| v.timestamp);
        if values.len() != before {
            warn!(
                dropped = before - values.len(),
                "Dropped samples with duplicate timestamps"
            );
        }

        let increment_secs = values
            .windows(2)
            .map(|w| ms_to_seconds(w[1].timestamp - w[0].timestamp))
            .filter(|gap| *gap > 0)
            .min()
            .unwrap_or(DEFAULT_INCREMENT_SECS);

        let start_secs = ms_to_seconds(values[0].timestamp);
        let end_secs = ms_to_seconds(values[values.len() - 1].timestamp);

        let mut list = Self::from_bounds(start_secs, end_secs, increment_secs)?;
        list.add_values(values)?;
        Ok(list)
    }

    fn from_bounds(start_secs: i64, end_secs: i64, increment_secs: i64) -> Result<Self> {
        let count = (end_secs - start_secs) / increment_secs + 1;
        if count >= i64::from(i32::MAX) {
            return Err(Error::validation(format!(
                "Time range too large: {count} buckets of {increment_secs}s"
            )));
        }
        let count = usize::try_from(count)
            .map_err(|_| Error::validation(format!("Invalid bucket count {count}")))?;

        Ok(Self {
            start_secs,
            end_secs,
            increment_secs,
            buckets: vec![None; count],
            size: 0,
            cache: OnceCell::new(),
        })
    }

    /// Add samples.
    ///
    /// Timestamps are rounded down to the second. Samples outside the window
    /// are dropped with a warning; a sample landing in an occupied bucket is an
    /// invariant violation.
    pub fn add_values(&mut self, values: impl IntoIterator<Item = MetricValue>) -> Result<()> {
        self.cache.take();

        for mut value in values {
            value.timestamp = round_down_to_second(value.timestamp);

            let Some(index) = self.bucket_index(value.timestamp) else {
                warn!(
                    timestamp = value.timestamp,
                    start = self.start_time(),
                    end = self.end_time(),
                    "Discarding value outside of the list's range"
                );
                continue;
            };

            let bucket = &mut self.buckets[index];
            if bucket.is_some() {
                return Err(Error::invariant(format!(
                    "Bucket {index} already holds a value (timestamp {})",
                    value.timestamp
                )));
            }
            *bucket = Some(value);
            self.size += 1;
        }

        Ok(())
    }

    /// Add one sample; see [`MetricValueList::add_values`]
    pub fn add_value(&mut self, value: MetricValue) -> Result<()> {
        self.add_values(std::iter::once(value))
    }

    /// Add `offset` (ms) to the timestamp of every stored sample
    pub fn shift_timestamp(&mut self, offset: i64) {
        self.cache.take();
        for value in self.buckets.iter_mut().flatten() {
            value.timestamp += offset;
        }
    }

    /// Bucket index of a timestamp (ms); may fall outside the window
    pub fn time_to_index(&self, timestamp: i64) -> i64 {
        (ms_to_seconds(timestamp) - self.start_secs).div_euclid(self.increment_secs)
    }

    /// Start time (ms) of a bucket
    pub fn index_to_time(&self, index: i64) -> i64 {
        (self.start_secs + index * self.increment_secs) * MS_PER_SECOND
    }

    fn bucket_index(&self, timestamp: i64) -> Option<usize> {
        usize::try_from(self.time_to_index(timestamp))
            .ok()
            .filter(|index| *index < self.buckets.len())
    }

    /// Bucket at `index`, `None` when empty or out of range
    pub fn get(&self, index: usize) -> Option<&MetricValue> {
        self.buckets.get(index).and_then(Option::as_ref)
    }

    /// Non-empty buckets in ascending time order
    pub fn values(&self) -> &[MetricValue] {
        self.cache
            .get_or_init(|| self.buckets.iter().flatten().cloned().collect())
    }

    /// Earliest sample
    pub fn first(&self) -> Option<&MetricValue> {
        self.values().first()
    }

    /// Latest sample
    pub fn last(&self) -> Option<&MetricValue> {
        self.values().last()
    }

    /// Sample values without timestamps
    pub fn double_values(&self) -> Vec<f64> {
        self.values().iter().map(|v| v.value).collect()
    }

    /// Number of stored samples
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether no sample is stored
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Window start (ms)
    pub fn start_time(&self) -> i64 {
        self.start_secs * MS_PER_SECOND
    }

    /// Window end (ms)
    pub fn end_time(&self) -> i64 {
        self.end_secs * MS_PER_SECOND
    }

    /// Bucket width in seconds
    pub fn increment_secs(&self) -> i64 {
        self.increment_secs
    }
}

impl PartialEq for MetricValueList {
    fn eq(&self, other: &Self) -> bool {
        self.start_secs == other.start_secs
            && self.end_secs == other.end_secs
            && self.increment_secs == other.increment_secs
            && self.buckets == other.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MS_PER_MINUTE;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn value(minute: i64, v: f64) -> MetricValue {
        MetricValue::new(minute * MS_PER_MINUTE, v, "ms")
    }

    #[test]
    fn test_new_rounds_bounds_and_sizes_buckets() {
        let list = MetricValueList::new(90_000, 10 * MS_PER_MINUTE + 5).unwrap();
        assert_eq!(list.start_time(), MS_PER_MINUTE);
        assert_eq!(list.end_time(), 10 * MS_PER_MINUTE);
        assert_eq!(list.bucket_count(), 10);
        assert!(list.is_empty());
    }

    #[test]
    fn test_new_rejects_bad_ranges() {
        assert!(MetricValueList::new(10, 5).is_err());
        assert!(MetricValueList::with_increment(0, 10, 0).is_err());
        assert!(MetricValueList::with_increment(0, i64::from(i32::MAX) * 1000, 1).is_err());
    }

    #[test]
    fn test_add_values_orders_and_counts() {
        let mut list = MetricValueList::new(0, 10 * MS_PER_MINUTE).unwrap();
        list.add_values(vec![value(5, 5.0), value(1, 1.0), value(3, 3.0)])
            .unwrap();

        assert_eq!(list.size(), 3);
        assert_eq!(list.double_values(), vec![1.0, 3.0, 5.0]);
        assert_eq!(list.first().unwrap().timestamp, MS_PER_MINUTE);
        assert_eq!(list.last().unwrap().timestamp, 5 * MS_PER_MINUTE);
        assert_eq!(list.get(3).unwrap().value, 3.0);
        assert!(list.get(2).is_none());
    }

    #[test]
    fn test_add_values_discards_out_of_range() {
        let mut list = MetricValueList::new(0, 2 * MS_PER_MINUTE).unwrap();
        list.add_values(vec![value(-1, 0.0), value(1, 1.0), value(3, 3.0)])
            .unwrap();
        assert_eq!(list.size(), 1);
    }

    #[test]
    fn test_add_values_collision_is_invariant_error() {
        let mut list = MetricValueList::new(0, 2 * MS_PER_MINUTE).unwrap();
        list.add_value(value(1, 1.0)).unwrap();
        let err = list.add_value(MetricValue::new(MS_PER_MINUTE + 30_000, 2.0, ""));
        assert!(matches!(err, Err(Error::Invariant(_))));
    }

    #[test]
    fn test_cache_invalidated_on_mutation() {
        let mut list = MetricValueList::new(0, 5 * MS_PER_MINUTE).unwrap();
        list.add_value(value(1, 1.0)).unwrap();
        assert_eq!(list.values().len(), 1);

        list.add_value(value(2, 2.0)).unwrap();
        assert_eq!(list.values().len(), 2);

        list.shift_timestamp(-MS_PER_MINUTE);
        assert_eq!(list.first().unwrap().timestamp, 0);
    }

    #[test]
    fn test_from_values_infers_increment() {
        let list =
            MetricValueList::from_values(vec![value(10, 2.0), value(0, 0.0), value(5, 1.0)]).unwrap();
        assert_eq!(list.increment_secs(), 300);
        assert_eq!(list.start_time(), 0);
        assert_eq!(list.end_time(), 10 * MS_PER_MINUTE);
        assert_eq!(list.double_values(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_from_values_uneven_gaps_do_not_collide() {
        let list = MetricValueList::from_values(vec![value(0, 0.0), value(3, 1.0), value(5, 2.0), value(9, 3.0)])
            .unwrap();
        assert_eq!(list.size(), 4);
    }

    #[test]
    fn test_from_values_single_and_duplicates() {
        let single = MetricValueList::from_values(vec![value(4, 4.0)]).unwrap();
        assert_eq!(single.size(), 1);
        assert_eq!(single.increment_secs(), DEFAULT_INCREMENT_SECS);

        let dup = MetricValueList::from_values(vec![value(4, 4.0), value(4, 5.0)]).unwrap();
        assert_eq!(dup.double_values(), vec![4.0]);

        assert!(MetricValueList::from_values(Vec::new()).is_err());
    }

    proptest! {
        #[test]
        fn prop_index_round_trip(
            start in 0i64..1_000_000_000,
            span in 0i64..10_000_000,
            increment in 1i64..600,
            offset in 0.0f64..=1.0,
        ) {
            let end = start + span;
            let list = MetricValueList::with_increment(start, end, increment).unwrap();
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            let t = start + (span as f64 * offset) as i64;
            let index = list.time_to_index(t);

            prop_assert!(index >= 0 && index < list.bucket_count() as i64);
            prop_assert_eq!(list.index_to_time(index), round_down(t, increment * MS_PER_SECOND));
        }
    }
}
