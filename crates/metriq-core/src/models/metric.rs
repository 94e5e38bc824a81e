//! Metric identities, samples and wildcard patterns

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Wildcard character accepted in any `MetricId` field
pub const WILDCARD: char = '*';

/// Identity of a metric: a `(device, group, name)` triple.
///
/// Query functions stamp a display label onto the ids they produce
/// (`host1:cpu:load avg`). The label takes part in equality, so a function's
/// output never collides with its input, but it never changes the triple and
/// pattern matching ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricId {
    /// Device (host) the metric was collected on
    pub device: String,
    /// Metric group
    pub group: String,
    /// Metric name
    pub name: String,
    /// Display label appended by query functions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl MetricId {
    /// Create an unlabelled id
    pub fn new(device: impl Into<String>, group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            group: group.into(),
            name: name.into(),
            label: None,
        }
    }

    /// Copy of this id with `label` appended to its display label
    #[must_use]
    pub fn with_label(&self, label: &str) -> Self {
        let label = label.trim();
        let label = match &self.label {
            Some(existing) => format!("{existing} {label}"),
            None => label.to_string(),
        };
        Self {
            label: Some(label),
            ..self.clone()
        }
    }

    /// Copy of this id without a display label
    #[must_use]
    pub fn unlabelled(&self) -> Self {
        Self {
            label: None,
            ..self.clone()
        }
    }

    /// Whether any field contains a wildcard
    pub fn has_wildcard(&self) -> bool {
        self.wildcard_count() > 0
    }

    /// Number of fields that contain a wildcard
    pub fn wildcard_count(&self) -> usize {
        self.fields().iter().filter(|f| f.contains(WILDCARD)).count()
    }

    /// The `(device, group, name)` fields in order
    pub fn fields(&self) -> [&str; 3] {
        [&self.device, &self.group, &self.name]
    }

    /// Match a concrete id against this (possibly wildcarded) id.
    ///
    /// Compiles the pattern on every call; use [`MetricPattern`] on hot paths.
    pub fn matches(&self, id: &MetricId) -> Result<bool> {
        MetricPattern::new(self)?.matches(id)
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.device, self.group, self.name)?;
        if let Some(label) = &self.label {
            write!(f, " {label}")?;
        }
        Ok(())
    }
}

/// A `MetricId` with its fields compiled to anchored regular expressions.
///
/// `.` in a field is literal and `*` matches any run of characters.
#[derive(Debug, Clone)]
pub struct MetricPattern {
    id: MetricId,
    fields: [Regex; 3],
}

impl MetricPattern {
    /// Compile a pattern from an id
    pub fn new(id: &MetricId) -> Result<Self> {
        let [device, group, name] = id.fields();
        Ok(Self {
            id: id.unlabelled(),
            fields: [glob(device)?, glob(group)?, glob(name)?],
        })
    }

    /// The id this pattern was compiled from
    pub fn id(&self) -> &MetricId {
        &self.id
    }

    /// Whether `id` matches; `id` must be concrete
    pub fn matches(&self, id: &MetricId) -> Result<bool> {
        if id.has_wildcard() {
            return Err(Error::validation(format!(
                "Cannot match against a metric id containing a wildcard: {id}"
            )));
        }

        Ok(self
            .fields
            .iter()
            .zip(id.fields())
            .all(|(re, field)| re.is_match(field)))
    }
}

fn glob(field: &str) -> Result<Regex> {
    let pattern = format!("^{}$", regex::escape(field).replace(r"\*", ".*"));
    Regex::new(&pattern).map_err(|e| Error::validation(format!("Invalid metric pattern {field}: {e}")))
}

/// One timestamped sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Milliseconds since the epoch
    pub timestamp: i64,
    /// Sample value
    pub value: f64,
    /// Units of the value
    #[serde(default)]
    pub units: String,
}

impl MetricValue {
    /// Create a sample
    pub fn new(timestamp: i64, value: f64, units: impl Into<String>) -> Self {
        Self {
            timestamp,
            value,
            units: units.into(),
        }
    }

    /// Same timestamp and units with a different value
    #[must_use]
    pub fn with_value(&self, value: f64) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.value, self.timestamp)?;
        if !self.units.is_empty() {
            write!(f, " {}", self.units)?;
        }
        Ok(())
    }
}

/// One streamed sample of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Which metric
    #[serde(flatten)]
    pub id: MetricId,
    /// The sample
    #[serde(flatten)]
    pub value: MetricValue,
}

impl Metric {
    /// Create a metric sample
    pub fn new(id: MetricId, timestamp: i64, value: f64, units: impl Into<String>) -> Self {
        Self {
            id,
            value: MetricValue::new(timestamp, value, units),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.id, self.value)
    }
}
