//! Trigger comparators and conjunctions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Relation between a sample and an alert threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessEqual,
    /// `==`
    Equal,
}

impl Comparator {
    /// Parse a comparator token
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::GreaterEqual),
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessEqual),
            "==" => Ok(Self::Equal),
            "=" => Err(Error::parse("Unknown comparator = did you mean ==?")),
            other => Err(Error::parse(format!("Unknown comparator: {other}"))),
        }
    }

    /// Token as written in queries
    pub fn token(self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::Equal => "==",
        }
    }

    /// Whether `value <comparator> target` holds
    #[allow(clippy::float_cmp)]
    pub fn compare(self, value: f64, target: f64) -> bool {
        match self {
            Self::GreaterThan => value > target,
            Self::GreaterEqual => value >= target,
            Self::LessThan => value < target,
            Self::LessEqual => value <= target,
            Self::Equal => value == target,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Joins two trigger conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conjunction {
    /// Both hold
    And,
    /// Either holds
    Or,
}

impl Conjunction {
    /// Parse a conjunction token
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(Error::parse(format!("Unknown conjunction: {other}"))),
        }
    }

    /// Combine two outcomes
    pub fn apply(self, lhs: bool, rhs: bool) -> bool {
        match self {
            Self::And => lhs && rhs,
            Self::Or => lhs || rhs,
        }
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "and",
            Self::Or => "or",
        })
    }
}
