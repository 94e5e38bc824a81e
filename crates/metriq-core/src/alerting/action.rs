//! Alert and action lookup, and delivery of fired alerts

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{ActionKind, ActionRecord, AlertRecord, Metric};

/// Source of alert and action definitions
pub trait AlertCatalog: Send + Sync {
    /// Alert definition by id
    fn alert(&self, alert_id: i64) -> Result<Option<AlertRecord>>;

    /// Action definition by the name alert queries use
    fn action(&self, name: &str) -> Result<Option<ActionRecord>>;
}

/// Delivers a fired alert
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Run `action` for `alert`, triggered by `metric`
    async fn trigger(&self, metric: &Metric, alert: &AlertRecord, action: &ActionRecord) -> Result<()>;
}

/// Catalog held in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    alerts: RwLock<HashMap<i64, AlertRecord>>,
    actions: RwLock<HashMap<String, ActionRecord>>,
}

impl InMemoryCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding `alerts` and `actions`
    pub fn with_records(alerts: impl IntoIterator<Item = AlertRecord>, actions: impl IntoIterator<Item = ActionRecord>) -> Self {
        let catalog = Self::new();
        for alert in alerts {
            catalog.put_alert(alert);
        }
        for action in actions {
            catalog.put_action(action);
        }
        catalog
    }

    /// Insert or replace an alert
    pub fn put_alert(&self, alert: AlertRecord) {
        self.alerts.write().insert(alert.alert_id, alert);
    }

    /// Insert or replace an action
    pub fn put_action(&self, action: ActionRecord) {
        self.actions.write().insert(action.name.clone(), action);
    }

    /// Enabled alerts ordered by id
    pub fn enabled_alerts(&self) -> Vec<AlertRecord> {
        let mut alerts: Vec<AlertRecord> = self.alerts.read().values().filter(|a| a.enabled).cloned().collect();
        alerts.sort_by_key(|a| a.alert_id);
        alerts
    }
}

impl AlertCatalog for InMemoryCatalog {
    fn alert(&self, alert_id: i64) -> Result<Option<AlertRecord>> {
        Ok(self.alerts.read().get(&alert_id).cloned())
    }

    fn action(&self, name: &str) -> Result<Option<ActionRecord>> {
        Ok(self.actions.read().get(name).cloned())
    }
}

/// Writes every fired alert to the log.
///
/// Email and SMS delivery are outside this crate; those actions are logged
/// with their recipients so an external notifier can pick them up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl ActionDispatcher for LogDispatcher {
    async fn trigger(&self, metric: &Metric, alert: &AlertRecord, action: &ActionRecord) -> Result<()> {
        match &action.kind {
            ActionKind::Log => {
                info!(alert_id = alert.alert_id, action = %action.name, metric = %metric, query = %alert.query, "Alert fired");
            }
            ActionKind::Email { to } => {
                warn!(
                    alert_id = alert.alert_id,
                    action = %action.name,
                    to = %to.join(","),
                    metric = %metric,
                    "Alert fired, email delivery not configured"
                );
            }
            ActionKind::Sms { carrier, number } => {
                warn!(
                    alert_id = alert.alert_id,
                    action = %action.name,
                    carrier = %carrier,
                    number = %number,
                    metric = %metric,
                    "Alert fired, sms delivery not configured"
                );
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricId;

    #[test]
    fn test_catalog_lookup() {
        let mut disabled = AlertRecord::new(2, "m(\"a\",\"b\",\"c\") > 1 do page");
        disabled.enabled = false;
        let catalog = InMemoryCatalog::with_records(
            [AlertRecord::new(1, "m(\"a\",\"b\",\"c\") > 1 do page"), disabled],
            [ActionRecord::new(1, "page", ActionKind::Log)],
        );

        assert_eq!(catalog.alert(1).unwrap().unwrap().alert_id, 1);
        assert!(catalog.alert(3).unwrap().is_none());
        assert_eq!(catalog.action("page").unwrap().unwrap().action_id, 1);
        assert!(catalog.action("mail").unwrap().is_none());
        assert_eq!(catalog.enabled_alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_log_dispatcher_accepts_every_kind() {
        let metric = Metric::new(MetricId::new("a", "b", "c"), 0, 1.0, "");
        let alert = AlertRecord::new(1, "q");
        for kind in [
            ActionKind::Log,
            ActionKind::Email { to: vec!["ops@example.com".into()] },
            ActionKind::Sms { carrier: "att".into(), number: "5551234".into() },
        ] {
            let action = ActionRecord::new(1, "notify", kind);
            assert!(LogDispatcher.trigger(&metric, &alert, &action).await.is_ok());
        }
    }
}
