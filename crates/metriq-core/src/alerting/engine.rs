//! Registry of active alert queries and streaming evaluation

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::action::{ActionDispatcher, AlertCatalog};
use super::query::AlertQuery;
use crate::error::Result;
use crate::models::Metric;
use crate::telemetry::Telemetry;

/// Evaluates streamed metrics against every active alert query
pub struct AlertEngine {
    queries: RwLock<HashMap<i64, Arc<AlertQuery>>>,
    catalog: Arc<dyn AlertCatalog>,
    dispatcher: Arc<dyn ActionDispatcher>,
    telemetry: Telemetry,
}

impl AlertEngine {
    /// Create an engine with no active queries
    pub fn new(catalog: Arc<dyn AlertCatalog>, dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self {
            queries: RwLock::new(HashMap::new()),
            catalog,
            dispatcher,
            telemetry: Telemetry::new("alerting"),
        }
    }

    /// Use a shared telemetry handle
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Telemetry handle of this engine
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Add queries, replacing any with the same alert id
    pub fn add_or_update_alert_queries(&self, queries: impl IntoIterator<Item = AlertQuery>) {
        let mut registry = self.queries.write();
        for query in queries {
            let _enter = self.telemetry.span().enter();
            info!(alert_id = query.alert_id(), query = %query, "Adding alert query");
            registry.insert(query.alert_id(), Arc::new(query));
        }
    }

    /// Remove a query; returns whether it was active
    pub fn remove_query(&self, alert_id: i64) -> bool {
        let removed = self.queries.write().remove(&alert_id).is_some();
        debug!(alert_id, removed, "Removing alert query");
        removed
    }

    /// Snapshot of the active queries ordered by alert id
    pub fn get_active_queries(&self) -> Vec<Arc<AlertQuery>> {
        let mut queries: Vec<Arc<AlertQuery>> = self.queries.read().values().cloned().collect();
        queries.sort_by_key(|q| q.alert_id());
        queries
    }

    /// Feed a batch of samples through every active query and run the actions of those that fire.
    ///
    /// Returns the number of triggers. Queries are checked in alert id order.
    /// A query that fails on a sample, or a trigger whose records cannot be
    /// looked up, is logged and skipped so one bad alert cannot stall the stream.
    pub async fn process_metrics(&self, metrics: &[Metric]) -> Result<usize> {
        self.telemetry.record_evaluation();

        let triggered = {
            let registry = self.queries.read();
            let mut ordered: Vec<&Arc<AlertQuery>> = registry.values().collect();
            ordered.sort_by_key(|q| q.alert_id());

            let mut triggered = Vec::new();
            for metric in metrics {
                for query in &ordered {
                    match query.process_metric(metric) {
                        Ok(true) => triggered.push((Arc::clone(*query), metric)),
                        Ok(false) => {}
                        Err(e) => error!(alert_id = query.alert_id(), metric = %metric.id, error = %e, "Error evaluating alert"),
                    }
                }
            }
            triggered
        };

        debug!(metrics = metrics.len(), triggered = triggered.len(), "Processed metric batch");

        let mut fired = 0;
        for (query, metric) in triggered {
            match self.dispatch(&query, metric).await {
                Ok(true) => fired += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(alert_id = query.alert_id(), metric = %metric.id, error = %e, "Error looking up alert records");
                }
            }
        }
        Ok(fired)
    }

    async fn dispatch(&self, query: &AlertQuery, metric: &Metric) -> Result<bool> {
        let Some(alert) = self.catalog.alert(query.alert_id())? else {
            warn!(alert_id = query.alert_id(), "Triggered alert has no definition");
            return Ok(false);
        };
        let Some(action) = self.catalog.action(query.action_name())? else {
            warn!(alert_id = query.alert_id(), action = query.action_name(), "Unknown action");
            return Ok(false);
        };

        info!(alert_id = alert.alert_id, action = %action.name, metric = %metric, "Triggering alert");
        self.telemetry.record_trigger();
        if let Err(e) = self.dispatcher.trigger(metric, &alert, &action).await {
            error!(alert_id = alert.alert_id, action = %action.name, error = %e, "Action failed");
        }
        Ok(true)
    }
}
