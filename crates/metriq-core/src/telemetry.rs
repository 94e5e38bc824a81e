//! Logging setup and the telemetry handle shared by the engine components
//!
//! Components never reach for a global logger. Each one is handed a
//! [`Telemetry`] at construction time and emits its events inside that
//! handle's span, so a caller can tell evaluation logs apart from alert logs
//! and read a few counters without a metrics backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this twice is harmless;
/// the second subscriber is ignored.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = if config.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!("Logging already initialized: {}", e);
    }
}

/// Explicit telemetry handle for one engine component
#[derive(Debug, Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

#[derive(Debug)]
struct TelemetryInner {
    span: Span,
    evaluations: AtomicU64,
    triggers: AtomicU64,
}

impl Telemetry {
    /// Create a handle whose events are recorded under `component`
    pub fn new(component: &'static str) -> Self {
        Self::with_span(tracing::info_span!("metriq", component = component))
    }

    /// Handle that records counters but emits no span
    pub fn disabled() -> Self {
        Self::with_span(Span::none())
    }

    fn with_span(span: Span) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                span,
                evaluations: AtomicU64::new(0),
                triggers: AtomicU64::new(0),
            }),
        }
    }

    /// Span every event of the owning component is emitted in
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    /// Count one evaluation (a query run or a processed metric batch)
    pub fn record_evaluation(&self) {
        self.inner.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one fired alert
    pub fn record_trigger(&self) {
        self.inner.triggers.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> TelemetryStats {
        TelemetryStats {
            evaluations: self.inner.evaluations.load(Ordering::Relaxed),
            triggers: self.inner.triggers.load(Ordering::Relaxed),
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    /// Evaluations performed
    pub evaluations: u64,
    /// Alerts fired
    pub triggers: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_shared_between_clones() {
        let telemetry = Telemetry::disabled();
        let clone = telemetry.clone();

        telemetry.record_evaluation();
        clone.record_evaluation();
        clone.record_trigger();

        assert_eq!(
            telemetry.stats(),
            TelemetryStats {
                evaluations: 2,
                triggers: 1
            }
        );
    }
}
