use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default notification retention window (§4.7): `expiresAt = createdAt + 7d`.
/// Policy only — a sweeper is not part of the core.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Delivered,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// A rule match, ready to be appended to the relational store and published
/// on the broadcast channel (§4.7, §3 "Notification").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Assigned by the relational store on append; absent before persistence.
    #[serde(default)]
    pub id: Option<String>,
    pub client_id: String,
    pub rule_id: String,
    pub type_id: String,
    pub title: String,
    pub message: String,
    pub payload: BTreeMap<String, Value>,
    pub priority: Priority,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    /// Build a freshly-triggered notification with server identity still
    /// unassigned, `status = pending`, and `expiresAt` set from `created_at`
    /// plus the default retention window.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_id: impl Into<String>,
        rule_id: impl Into<String>,
        type_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        payload: BTreeMap<String, Value>,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            client_id: client_id.into(),
            rule_id: rule_id.into(),
            type_id: type_id.into(),
            title: title.into(),
            message: message.into(),
            payload,
            priority,
            status: NotificationStatus::Pending,
            created_at,
            expires_at: created_at + Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_notification_expires_seven_days_after_creation() {
        let created = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let n = Notification::new(
            "client-1",
            "rule-1",
            "geofence-enter",
            "Entered zone",
            "Vessel entered the zone",
            BTreeMap::new(),
            Priority::Normal,
            created,
        );
        assert_eq!(n.status, NotificationStatus::Pending);
        assert_eq!(n.expires_at, created + Duration::days(7));
        assert!(n.id.is_none());
    }
}
