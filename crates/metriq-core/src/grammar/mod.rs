//! Query text to executable query
//!
//! [`parse`] turns text into a [`ParseNode`] tree; [`Compiler`] folds a tree
//! into a [`GraphQuery`] or an [`AlertQuery`], validating what each kind of
//! query may contain. Trees produced elsewhere can be compiled with
//! [`Compiler::build_graph_query`] and [`Compiler::build_alert_query`].

pub mod ast;
mod builder;
pub mod comparator;
mod parser;

pub use ast::ParseNode;
pub use comparator::{Comparator, Conjunction};
pub use parser::parse;

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::alerting::AlertQuery;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph::GraphQuery;
use crate::query::QueryKind;
use builder::TreeBuilder;

/// Compiles query text and parse trees
#[derive(Debug, Clone, Copy)]
pub struct Compiler {
    /// Fixed "now" for relative times; the wall clock when unset
    now: Option<DateTime<Utc>>,
    offset: FixedOffset,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            now: None,
            offset: Utc.fix(),
        }
    }
}

impl Compiler {
    /// Compiler resolving absolute dates at the configured UTC offset
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            Error::config(format!("Invalid UTC offset: {} minutes", config.utc_offset_minutes))
        })?;
        Ok(Self { now: None, offset })
    }

    /// Resolve relative times against `now` instead of the wall clock
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Offset absolute dates are read in
    pub fn utc_offset(&self) -> FixedOffset {
        self.offset
    }

    /// Parse and compile a graph query
    pub fn compile_graph_query(&self, text: &str) -> Result<GraphQuery> {
        self.build_graph_query(&parse(text)?)
    }

    /// Parse and compile an alert query
    pub fn compile_alert_query(&self, text: &str) -> Result<AlertQuery> {
        self.build_alert_query(&parse(text)?)
    }

    /// Compile a graph query from a parse tree
    pub fn build_graph_query(&self, tree: &ParseNode) -> Result<GraphQuery> {
        self.builder(QueryKind::Graph).graph_query(tree)
    }

    /// Compile an alert query from a parse tree
    pub fn build_alert_query(&self, tree: &ParseNode) -> Result<AlertQuery> {
        self.builder(QueryKind::Alert).alert_query(tree)
    }

    fn builder(&self, kind: QueryKind) -> TreeBuilder {
        TreeBuilder::new(kind, self.now.unwrap_or_else(Utc::now), self.offset)
    }
}
