//! Executable query node graph

use std::fmt;

use super::argument::{Argument, RelativeTime};
use super::evaluator::Evaluator;
use crate::error::{Error, Result};
use crate::functions::FunctionCall;
use crate::models::MetricId;
use crate::series::SeriesMap;

/// How a connector joins its two subtrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    /// `|`: feed the left result into the right side
    Pipe,
    /// `>|`: like pipe, but keep the left result alongside the right one
    Copy,
    /// `&`: end of the query; what follows is a trailing clause
    Terminator,
}

impl ConnectorKind {
    /// Parse a connector token
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "|" => Ok(Self::Pipe),
            ">|" => Ok(Self::Copy),
            "&" => Ok(Self::Terminator),
            other => Err(Error::parse(format!("Unknown connector: {other}"))),
        }
    }

    /// Token as written in queries
    pub fn token(self) -> &'static str {
        match self {
            Self::Pipe => "|",
            Self::Copy => ">|",
            Self::Terminator => "&",
        }
    }
}

/// Arithmetic operator of a math node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
}

impl MathOp {
    /// Parse an operator token
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "+" => Ok(Self::Add),
            "-" => Ok(Self::Subtract),
            "*" => Ok(Self::Multiply),
            "/" => Ok(Self::Divide),
            other => Err(Error::parse(format!("Unknown math operator: {other}"))),
        }
    }

    /// Operator character
    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }

    /// Apply the operator
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide => lhs / rhs,
        }
    }

    /// Whether only two operands are allowed
    pub fn is_binary_only(self) -> bool {
        matches!(self, Self::Subtract | Self::Divide)
    }
}

/// Leaf that produces series
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Stored metric, possibly wildcarded, with optional overlay offsets
    Metric {
        /// Id or pattern to read
        id: MetricId,
        /// Past offsets to overlay, e.g. `-1d`
        offsets: Vec<RelativeTime>,
    },
    /// Constant value, one sample per minute
    Constant {
        /// The value
        value: f64,
        /// Distinguishes constants within one query
        index: usize,
    },
}

impl Source {
    /// Id under which a constant's series is produced
    pub fn constant_id(index: usize) -> MetricId {
        MetricId::new("", format!("CONSTANT{index}"), "")
    }
}

/// A node of the executable query graph
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// Series producer
    Source(Source),
    /// Join of two subtrees
    Connector {
        /// Join kind
        kind: ConnectorKind,
        /// Evaluated first
        left: Box<QueryNode>,
        /// Evaluated with the left result as context
        right: Box<QueryNode>,
    },
    /// Element-wise arithmetic
    Math {
        /// Operator
        op: MathOp,
        /// Left operand
        left: Box<QueryNode>,
        /// Right operand
        right: Box<QueryNode>,
        /// `false` switches gap filling from averaging to zeros
        args: Vec<Argument>,
    },
    /// Library function applied to the incoming context
    Function(FunctionCall),
}

impl QueryNode {
    /// Metric source without offsets
    pub fn metric(id: MetricId) -> Self {
        Self::Source(Source::Metric {
            id,
            offsets: Vec::new(),
        })
    }

    /// Constant source
    pub fn constant(value: f64, index: usize) -> Self {
        Self::Source(Source::Constant { value, index })
    }

    /// Connector node
    pub fn connector(kind: ConnectorKind, left: QueryNode, right: QueryNode) -> Self {
        Self::Connector {
            kind,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Math node without arguments
    pub fn math(op: MathOp, left: QueryNode, right: QueryNode) -> Self {
        Self::Math {
            op,
            left: Box::new(left),
            right: Box::new(right),
            args: Vec::new(),
        }
    }

    /// Left child, if any
    pub fn left(&self) -> Option<&QueryNode> {
        match self {
            Self::Connector { left, .. } | Self::Math { left, .. } => Some(left),
            Self::Source(_) | Self::Function(_) => None,
        }
    }

    /// Right child, if any
    pub fn right(&self) -> Option<&QueryNode> {
        match self {
            Self::Connector { right, .. } | Self::Math { right, .. } => Some(right),
            Self::Source(_) | Self::Function(_) => None,
        }
    }

    /// Whether this node is a graph rendering function
    pub fn is_render(&self) -> bool {
        matches!(self, Self::Function(call) if call.function.is_render())
    }

    /// Evaluate this node; see [`Evaluator::process`]
    pub fn process(&self, evaluator: &Evaluator, start: i64, end: i64, context: SeriesMap) -> Result<SeriesMap> {
        evaluator.process(self, start, end, context)
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(Source::Metric { id, offsets }) => {
                write!(f, "m(\"{}\", \"{}\", \"{}\"", id.device, id.group, id.name)?;
                match offsets.as_slice() {
                    [] => {}
                    [offset] => write!(f, ", {offset}")?,
                    many => {
                        let many: Vec<String> = many.iter().map(ToString::to_string).collect();
                        write!(f, ", [{}]", many.join(", "))?;
                    }
                }
                write!(f, ")")
            }
            Self::Source(Source::Constant { value, .. }) => write!(f, "{value}"),
            Self::Connector { kind, left, right } => write!(f, "{left} {} {right}", kind.token()),
            Self::Math { op, left, right, .. } => write!(f, "({left} {} {right})", op.symbol()),
            Self::Function(call) => write!(f, "{call}"),
        }
    }
}
