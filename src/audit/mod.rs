//! Audit trail for data access and user actions.

pub mod logger;

pub use logger::AuditLogger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    DataAccess,
    UserAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: AuditKind,
    /// Acting user; `None` for system jobs
    pub user_id: Option<i64>,
    pub resource: String,
    pub action: String,
    pub record_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AuditRecord {
    pub fn new(kind: AuditKind, user_id: Option<i64>, resource: &str, action: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            kind,
            user_id,
            resource: resource.to_string(),
            action: action.to_string(),
            record_id: None,
            details: None,
        }
    }

    pub fn with_record(mut self, record_id: i64) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
