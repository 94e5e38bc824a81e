//! Alerting for Metriq
//!
//! Alert queries are compiled once and kept in the [`AlertEngine`] registry.
//! Every streamed sample is checked against each active query; a query fires
//! once its condition has held for longer than its duration, and the engine
//! then runs the named action through an [`ActionDispatcher`].

mod action;
mod engine;
mod pipeline;
mod query;

pub use action::{ActionDispatcher, AlertCatalog, InMemoryCatalog, LogDispatcher};
pub use engine::AlertEngine;
pub use pipeline::{AlertPipeline, PipelineStats};
pub use query::{AlertQuery, AlertState, Condition, TriggerExpression};
