//! Query node graph and its evaluation
//!
//! A compiled query is a binary tree of [`QueryNode`]s. Every node is
//! evaluated by [`Evaluator::process`] with the time window and the series
//! produced by its preceding sibling (the *context*), and returns the series
//! it produces.

pub mod argument;
pub mod evaluator;
pub mod math;
pub mod node;

pub use argument::{Argument, Number, RelativeTime, TimeUnit};
pub use evaluator::Evaluator;
pub use node::{ConnectorKind, MathOp, QueryNode, Source};

/// Which kind of query is being compiled; decides the allowed constructs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Time-windowed query rendered as a graph
    Graph,
    /// Streaming threshold condition
    Alert,
}
