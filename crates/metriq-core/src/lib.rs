//! # Metriq
//!
//! Query language, evaluation engine and streaming alerts for time-series metrics.
//!
//! Metrics are identified by a `(device, group, name)` triple. Queries select
//! metrics, pipe them through functions, combine them arithmetically and draw
//! the result; alert queries watch a single metric and fire an action once a
//! threshold has held for long enough.
//!
//! ## Architecture
//!
//! - **Series**: minute-bucketed time-series container with fill, aggregate and map operations
//! - **Query**: executable node graph evaluated against a metric store
//! - **Functions**: averaging, bucketing, filtering, calculus, extrema, correlation and arithmetic
//! - **Grammar**: query text to parse tree to executable query
//! - **Graph**: point budgets and rendering into line, area and histogram payloads
//! - **Alerting**: registry of compiled alerts, trigger state machine and ingestion pipeline
//!
//! ## Quick Start
//!
//! ```bash
//! # Draw the last hour of a metric from a JSON fixture
//! metriq graph --data metrics.json '-1h m("host1", "cpu", "load") | avg(5)'
//!
//! # Replay samples through alert definitions
//! metriq alert replay --data metrics.json --alerts alerts.json --actions actions.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod config;
pub mod error;
pub mod functions;
pub mod grammar;
pub mod graph;
pub mod models;
pub mod query;
pub mod series;
pub mod store;
pub mod telemetry;
pub mod time;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertEngine, AlertPipeline, AlertQuery};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::grammar::Compiler;
    pub use crate::graph::{GraphObject, GraphQuery};
    pub use crate::models::*;
    pub use crate::query::{Evaluator, QueryNode};
    pub use crate::series::{MetricValueList, SeriesMap};
    pub use crate::store::{InMemoryStore, MetricMetadata, MetricReader, MetricWriter};
}
