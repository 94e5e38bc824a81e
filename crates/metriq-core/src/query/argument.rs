//! Literal arguments passed to query functions and math nodes

use std::fmt;

use crate::error::{Error, Result};
use crate::time::{MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND, MS_PER_WEEK};

/// Numeric literal, integer or decimal as written
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Written without a decimal point
    Integer(i64),
    /// Written with a decimal point
    Float(f64),
}

impl Number {
    /// Value as a float
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    /// Value as an integer, truncating decimals
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Integer(i) => i,
            Self::Float(f) => f as i64,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Unit of a relative time literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// `s`
    Seconds,
    /// `m`
    Minutes,
    /// `h`
    Hours,
    /// `d`
    Days,
    /// `w`, seven days
    Weeks,
}

impl TimeUnit {
    /// Parse a unit suffix
    pub fn from_suffix(suffix: &str) -> Result<Self> {
        match suffix {
            "s" => Ok(Self::Seconds),
            "m" => Ok(Self::Minutes),
            "h" => Ok(Self::Hours),
            "d" => Ok(Self::Days),
            "w" => Ok(Self::Weeks),
            other => Err(Error::parse(format!("Unknown time unit: {other}"))),
        }
    }

    /// Suffix as written in queries
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Minutes => "m",
            Self::Hours => "h",
            Self::Days => "d",
            Self::Weeks => "w",
        }
    }

    /// Length of one unit in milliseconds
    pub fn millis(self) -> i64 {
        match self {
            Self::Seconds => MS_PER_SECOND,
            Self::Minutes => MS_PER_MINUTE,
            Self::Hours => MS_PER_HOUR,
            Self::Days => MS_PER_DAY,
            Self::Weeks => MS_PER_WEEK,
        }
    }
}

/// Signed duration such as `-30m` or `1d`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelativeTime {
    amount: i64,
    unit: TimeUnit,
}

impl RelativeTime {
    /// Create a duration; zero is rejected
    pub fn new(amount: i64, unit: TimeUnit) -> Result<Self> {
        if amount == 0 {
            return Err(Error::parse("Duration cannot be zero"));
        }
        Ok(Self { amount, unit })
    }

    /// Signed amount of units
    pub fn amount(self) -> i64 {
        self.amount
    }

    /// Unit
    pub fn unit(self) -> TimeUnit {
        self.unit
    }

    /// Signed length in milliseconds
    pub fn millis(self) -> i64 {
        self.amount * self.unit.millis()
    }

    /// Whether the duration points into the past
    pub fn is_negative(self) -> bool {
        self.amount < 0
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

/// A literal argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Quoted string
    String(String),
    /// Number
    Number(Number),
    /// `true` / `false`
    Boolean(bool),
    /// `N%`, stored as a decimal fraction
    Percent(f64),
    /// Relative time
    RelativeTime(RelativeTime),
}

impl Argument {
    /// Short name of the argument's kind for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Percent(_) => "percent",
            Self::RelativeTime(_) => "relative time",
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Percent(p) => write!(f, "{}%", p * 100.0),
            Self::RelativeTime(t) => write!(f, "{t}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_time() {
        let week = RelativeTime::new(-1, TimeUnit::from_suffix("w").unwrap()).unwrap();
        assert_eq!(week.millis(), -7 * MS_PER_DAY);
        assert!(week.is_negative());
        assert_eq!(week.to_string(), "-1w");
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = RelativeTime::new(0, TimeUnit::Minutes).unwrap_err();
        assert_eq!(err.to_string(), "Duration cannot be zero");
    }

    #[test]
    fn test_unknown_unit() {
        assert!(TimeUnit::from_suffix("y").is_err());
    }

    #[test]
    fn test_number_conversions() {
        assert_eq!(Number::Float(2.9).as_i64(), 2);
        assert!((Number::Integer(3).as_f64() - 3.0).abs() < f64::EPSILON);
    }
}
