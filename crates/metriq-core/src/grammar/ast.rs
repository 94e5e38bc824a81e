//! Typed parse tree
//!
//! This is the hand-off point between a tokenizer and the tree builder. Token
//! images that need validation (comparators, connectors, operators, units,
//! function names) are kept as text so the builder can reject them with a
//! precise message.

use serde::{Deserialize, Serialize};

/// A node of the parse tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", content = "value", rename_all = "snake_case")]
pub enum ParseNode {
    /// `<start> [to <end>] <expression>`
    GraphQuery {
        /// Relative time, absolute date or time of day
        start: Box<ParseNode>,
        /// Defaults to now
        end: Option<Box<ParseNode>>,
        /// The expression to draw
        expression: Box<ParseNode>,
    },
    /// `<expression> <trigger> do <action>`
    AlertQuery {
        /// The watched metric
        expression: Box<ParseNode>,
        /// Condition
        trigger: Box<ParseNode>,
        /// Name of the action to run
        action: String,
    },
    /// `<comparator> <number> [<conjunction> <comparator> <number>]... [for <duration>]`
    Trigger {
        /// Comparators, numbers and conjunctions in source order
        conditions: Vec<ParseNode>,
        /// How long the condition must hold
        duration: Option<Box<ParseNode>>,
    },
    /// Leading juxtaposed operands followed by `connector operand` pairs
    Expression(Vec<ParseNode>),
    /// `|`, `>|` or `&`
    Connector(String),
    /// Arithmetic; one child is a plain operand
    Math {
        /// `+`, `-`, `*` or `/`
        op: String,
        /// One or two operands
        children: Vec<ParseNode>,
    },
    /// `m(device, group, name[, offsets])`
    Metric(Vec<ParseNode>),
    /// `["a", "b"]`
    StringArray(Vec<ParseNode>),
    /// `name` or `name(args)`
    Function {
        /// Function name
        name: String,
        /// Argument list, when parenthesized
        args: Option<Box<ParseNode>>,
    },
    /// Function arguments
    ArgumentList(Vec<ParseNode>),
    /// Quoted text, quotes removed
    StringLiteral(String),
    /// Numeric image; decimal when it contains a `.`
    NumberLiteral(String),
    /// Unsigned whole number
    IntegerLiteral(i64),
    /// `N%`
    PercentLiteral(i64),
    /// `true` / `false`
    BooleanLiteral(bool),
    /// `-30m`
    RelativeTime {
        /// Leading minus sign
        negative: bool,
        /// Magnitude
        amount: i64,
        /// Unit suffix
        unit: String,
    },
    /// `[-1d, -1w]`
    RelativeTimeArray(Vec<ParseNode>),
    /// `YYYY-MM-DD HH:MM`
    AbsoluteDate {
        /// Year
        year: i64,
        /// Month
        month: i64,
        /// Day of month
        day: i64,
        /// Time of day
        time: Box<ParseNode>,
    },
    /// `H:MM[am|pm]`
    AbsoluteTime {
        /// Hour as written
        hour: i64,
        /// Minute
        minute: i64,
        /// `am` or `pm`
        meridiem: Option<String>,
    },
    /// `>`, `>=`, `<`, `<=`, `==`
    Comparator(String),
    /// `and` / `or`
    Conjunction(String),
}

impl ParseNode {
    /// Short name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GraphQuery { .. } => "graph query",
            Self::AlertQuery { .. } => "alert query",
            Self::Trigger { .. } => "trigger",
            Self::Expression(_) => "expression",
            Self::Connector(_) => "connector",
            Self::Math { .. } => "math expression",
            Self::Metric(_) => "metric",
            Self::StringArray(_) => "string array",
            Self::Function { .. } => "function",
            Self::ArgumentList(_) => "argument list",
            Self::StringLiteral(_) => "string",
            Self::NumberLiteral(_) => "number",
            Self::IntegerLiteral(_) => "integer",
            Self::PercentLiteral(_) => "percent",
            Self::BooleanLiteral(_) => "boolean",
            Self::RelativeTime { .. } => "relative time",
            Self::RelativeTimeArray(_) => "relative time array",
            Self::AbsoluteDate { .. } => "date",
            Self::AbsoluteTime { .. } => "time",
            Self::Comparator(_) => "comparator",
            Self::Conjunction(_) => "conjunction",
        }
    }

    /// Shorthand for a quoted string
    pub fn string(value: impl Into<String>) -> Self {
        Self::StringLiteral(value.into())
    }

    /// Shorthand for a relative time
    pub fn relative(negative: bool, amount: i64, unit: impl Into<String>) -> Self {
        Self::RelativeTime {
            negative,
            amount,
            unit: unit.into(),
        }
    }
}
