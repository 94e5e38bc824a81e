//! Persisted alert and action definitions

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored alert definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Unique identifier
    pub alert_id: i64,

    /// Alert query text, e.g. `m("host1","cpu","load") > 0.9 for 5m do page`
    pub query: String,

    /// Whether the alert is evaluated
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// When the definition last changed
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl AlertRecord {
    /// Create an enabled record
    pub fn new(alert_id: i64, query: impl Into<String>) -> Self {
        Self {
            alert_id,
            query: query.into(),
            enabled: true,
            modified_at: Utc::now(),
        }
    }
}

impl fmt::Display for AlertRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            write!(f, "DISABLED: ")?;
        }
        write!(f, "{}: {}", self.alert_id, self.query)
    }
}

/// How an action is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Write the alert to the log
    Log,
    /// Email notification
    Email {
        /// Recipient addresses
        to: Vec<String>,
    },
    /// Text message through a carrier gateway
    Sms {
        /// Carrier whose gateway delivers the message
        carrier: String,
        /// Phone number
        number: String,
    },
}

/// A named action an alert query refers to with `do <name>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Unique identifier
    pub action_id: i64,

    /// Name used in alert queries
    pub name: String,

    /// Delivery details
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl ActionRecord {
    /// Create an action record
    pub fn new(action_id: i64, name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            action_id,
            name: name.into(),
            kind,
        }
    }
}

impl fmt::Display for ActionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ", self.action_id, self.name)?;
        match &self.kind {
            ActionKind::Log => write!(f, "log"),
            ActionKind::Email { to } => write!(f, "email {}", to.join(",")),
            ActionKind::Sms { carrier, number } => write!(f, "sms {carrier} {number}"),
        }
    }
}
