//! Compiled alert conditions and the per-metric trigger state machine

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::grammar::{Comparator, Conjunction};
use crate::models::{Metric, MetricId, MetricPattern};

/// `<comparator> <target>`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Condition {
    /// Relation to the target
    pub comparator: Comparator,
    /// Threshold
    pub target: f64,
}

impl Condition {
    /// Create a condition
    pub fn new(comparator: Comparator, target: f64) -> Self {
        Self { comparator, target }
    }

    /// Whether `value` satisfies the condition
    pub fn holds(&self, value: f64) -> bool {
        self.comparator.compare(value, self.target)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.comparator, self.target)
    }
}

/// Threshold part of an alert query: one or more conditions and an optional sustain duration.
///
/// Conditions are combined left to right, `a and b or c` meaning `(a and b) or c`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerExpression {
    first: Condition,
    rest: Vec<(Conjunction, Condition)>,
    duration_ms: i64,
}

impl TriggerExpression {
    /// Trigger with a single condition and no duration
    pub fn new(first: Condition) -> Self {
        Self {
            first,
            rest: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Append a condition
    #[must_use]
    pub fn join(mut self, conjunction: Conjunction, condition: Condition) -> Self {
        self.rest.push((conjunction, condition));
        self
    }

    /// Require the conditions to hold for longer than `duration_ms`
    #[must_use]
    pub fn with_duration(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Sustain duration in milliseconds; zero fires on the first matching sample
    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    /// First condition
    pub fn condition(&self) -> &Condition {
        &self.first
    }

    /// Whether `value` satisfies the combined conditions
    pub fn is_satisfied(&self, value: f64) -> bool {
        self.rest
            .iter()
            .fold(self.first.holds(value), |acc, (conjunction, condition)| {
                conjunction.apply(acc, condition.holds(value))
            })
    }
}

impl fmt::Display for TriggerExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (conjunction, condition) in &self.rest {
            write!(f, " {conjunction} {condition}")?;
        }
        if self.duration_ms > 0 {
            let duration = Duration::from_millis(self.duration_ms.unsigned_abs());
            write!(f, " for {}", humantime::format_duration(duration))?;
        }
        Ok(())
    }
}

/// Where one metric identity stands against an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// No occurrence recorded
    Idle,
    /// Condition holds, duration not yet elapsed
    Pending {
        /// Timestamp of the first satisfying sample
        since: i64,
    },
    /// Condition has held for longer than the duration
    Firing {
        /// Timestamp of the first satisfying sample
        since: i64,
    },
}

/// A compiled alert: a metric pattern, a trigger and the action to run
#[derive(Debug)]
pub struct AlertQuery {
    alert_id: i64,
    pattern: MetricPattern,
    trigger: TriggerExpression,
    action_name: String,
    /// First satisfying timestamp per concrete metric
    first_occurrence: Mutex<HashMap<MetricId, i64>>,
}

impl AlertQuery {
    /// Compile an alert for `metric`, which may contain at most one wildcard field
    pub fn new(metric: &MetricId, trigger: TriggerExpression, action_name: impl Into<String>) -> Result<Self> {
        if metric.wildcard_count() > 1 {
            return Err(Error::parse("Cannot have a metric with more than one wildcard"));
        }
        Ok(Self {
            alert_id: 0,
            pattern: MetricPattern::new(metric)?,
            trigger,
            action_name: action_name.into(),
            first_occurrence: Mutex::new(HashMap::new()),
        })
    }

    /// Set the id of the alert definition this query belongs to
    #[must_use]
    pub fn with_alert_id(mut self, alert_id: i64) -> Self {
        self.alert_id = alert_id;
        self
    }

    /// Id of the alert definition
    pub fn alert_id(&self) -> i64 {
        self.alert_id
    }

    /// Watched metric (possibly wildcarded)
    pub fn metric_id(&self) -> &MetricId {
        self.pattern.id()
    }

    /// Threshold
    pub fn trigger(&self) -> &TriggerExpression {
        &self.trigger
    }

    /// Name of the action run on trigger
    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    /// Whether `id` is watched by this alert
    pub fn matches(&self, id: &MetricId) -> Result<bool> {
        self.pattern.matches(id)
    }

    /// Feed one sample; returns `true` when the alert fires for it.
    ///
    /// Samples of metrics the pattern does not match never fire and leave the
    /// state untouched.
    pub fn process_metric(&self, metric: &Metric) -> Result<bool> {
        if !self.matches(&metric.id)? {
            return Ok(false);
        }

        let timestamp = metric.value.timestamp;
        let mut occurrences = self.first_occurrence.lock();

        if !self.trigger.is_satisfied(metric.value.value) {
            if occurrences.remove(&metric.id).is_some() {
                debug!(alert_id = self.alert_id, metric = %metric.id, "Condition cleared");
            }
            return Ok(false);
        }

        if self.trigger.duration_ms == 0 {
            return Ok(true);
        }

        match occurrences.get(&metric.id) {
            Some(since) => {
                let fired = timestamp > since + self.trigger.duration_ms;
                trace!(alert_id = self.alert_id, metric = %metric.id, since, timestamp, fired, "Condition still holds");
                Ok(fired)
            }
            None => {
                debug!(alert_id = self.alert_id, metric = %metric.id, timestamp, "Condition started");
                occurrences.insert(metric.id.clone(), timestamp);
                Ok(false)
            }
        }
    }

    /// State of `id` as of the last processed sample at `now`
    pub fn state(&self, id: &MetricId, now: i64) -> AlertState {
        match self.first_occurrence.lock().get(id) {
            None => AlertState::Idle,
            Some(&since) if now > since + self.trigger.duration_ms => AlertState::Firing { since },
            Some(&since) => AlertState::Pending { since },
        }
    }
}

impl fmt::Display for AlertQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} do {}",
            self.alert_id,
            self.pattern.id(),
            self.trigger,
            self.action_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::MS_PER_MINUTE;
    use pretty_assertions::assert_eq;

    fn load(device: &str) -> MetricId {
        MetricId::new(device, "cpu", "load")
    }

    fn sample(device: &str, minute: i64, value: f64) -> Metric {
        Metric::new(load(device), minute * MS_PER_MINUTE, value, "")
    }

    fn above(target: f64, minutes: i64) -> TriggerExpression {
        TriggerExpression::new(Condition::new(Comparator::GreaterThan, target)).with_duration(minutes * MS_PER_MINUTE)
    }

    #[test]
    fn test_sustained_threshold_fires_after_duration() {
        let alert = AlertQuery::new(&load("host1"), above(0.9, 5), "page").unwrap();

        let fired: Vec<bool> = (0..10)
            .map(|m| alert.process_metric(&sample("host1", m, 0.95)).unwrap())
            .collect();
        // occurrence at minute 0, so minute 5 is still within the duration
        assert_eq!(fired, vec![false, false, false, false, false, false, true, true, true, true]);
        assert_eq!(alert.state(&load("host1"), 9 * MS_PER_MINUTE), AlertState::Firing { since: 0 });

        assert!(!alert.process_metric(&sample("host1", 10, 0.5)).unwrap());
        assert_eq!(alert.state(&load("host1"), 10 * MS_PER_MINUTE), AlertState::Idle);
        assert!(!alert.process_metric(&sample("host1", 11, 0.95)).unwrap());
    }

    #[test]
    fn test_without_duration_every_sample_fires() {
        let alert = AlertQuery::new(&load("host1"), above(0.9, 0), "page").unwrap();
        assert!(alert.process_metric(&sample("host1", 0, 1.0)).unwrap());
        assert!(alert.process_metric(&sample("host1", 1, 1.0)).unwrap());
        assert!(!alert.process_metric(&sample("host1", 2, 0.1)).unwrap());
    }

    #[test]
    fn test_occurrences_are_tracked_per_metric() {
        let alert = AlertQuery::new(&load("*"), above(0.9, 1), "page").unwrap();

        assert!(!alert.process_metric(&sample("host1", 0, 1.0)).unwrap());
        assert!(!alert.process_metric(&sample("host2", 1, 1.0)).unwrap());
        assert!(alert.process_metric(&sample("host1", 2, 1.0)).unwrap());
        assert_eq!(alert.state(&load("host2"), 2 * MS_PER_MINUTE), AlertState::Pending { since: MS_PER_MINUTE });
    }

    #[test]
    fn test_non_matching_metric_is_ignored() {
        let alert = AlertQuery::new(&load("host1"), above(0.0, 0), "page").unwrap();
        assert!(!alert.process_metric(&sample("host2", 0, 5.0)).unwrap());
    }

    #[test]
    fn test_two_wildcards_rejected() {
        let err = AlertQuery::new(&MetricId::new("*", "*", "load"), above(0.9, 0), "page").unwrap_err();
        assert_eq!(err.to_string(), "Cannot have a metric with more than one wildcard");
    }

    #[test]
    fn test_compound_conditions() {
        let trigger = TriggerExpression::new(Condition::new(Comparator::GreaterThan, 1.0))
            .join(Conjunction::And, Condition::new(Comparator::LessThan, 5.0))
            .join(Conjunction::Or, Condition::new(Comparator::Equal, 10.0));

        assert!(trigger.is_satisfied(3.0));
        assert!(!trigger.is_satisfied(7.0));
        assert!(trigger.is_satisfied(10.0));
        assert_eq!(trigger.to_string(), "> 1 and < 5 or == 10");
    }

    #[test]
    fn test_display() {
        let alert = AlertQuery::new(&load("host1"), above(0.9, 5), "page")
            .unwrap()
            .with_alert_id(7);
        assert_eq!(alert.to_string(), "7: host1:cpu:load > 0.9 for 5m do page");
    }
}
