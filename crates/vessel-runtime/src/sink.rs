use chrono::{DateTime, Utc};
use orion_error::prelude::*;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::Json;
use tokio::sync::broadcast;

use vessel_core::notification::Notification;
use vessel_core::record::VesselRecord;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::metrics::DiscoveryCounts;

/// Default channel capacity for the broadcast fan-out. A lagging subscriber
/// drops messages rather than blocking the sink (§4.7).
pub const BROADCAST_CAPACITY: usize = 1024;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationEnvelope<'a> {
    client_id: &'a str,
    notification: &'a Notification,
}

#[derive(Serialize)]
struct VesselUpdateEnvelope<'a> {
    vessel: &'a VesselRecord,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct DiscoveryStatsEnvelope<'a> {
    stats: &'a DiscoveryCounts,
    timestamp: DateTime<Utc>,
}

/// Notification Sink (C7): appends notifications to the relational store and
/// fans them (plus vessel updates and discovery stats) out to whichever
/// downstream subscribers are attached via the three named broadcast
/// channels.
pub struct NotificationSink {
    pool: PgPool,
    notifications_tx: broadcast::Sender<String>,
    vessel_updates_tx: broadcast::Sender<String>,
    discovery_stats_tx: broadcast::Sender<String>,
}

impl NotificationSink {
    pub fn new(pool: PgPool) -> Self {
        let (notifications_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (vessel_updates_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (discovery_stats_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            pool,
            notifications_tx,
            vessel_updates_tx,
            discovery_stats_tx,
        }
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<String> {
        self.notifications_tx.subscribe()
    }

    pub fn subscribe_vessel_updates(&self) -> broadcast::Receiver<String> {
        self.vessel_updates_tx.subscribe()
    }

    pub fn subscribe_discovery_stats(&self) -> broadcast::Receiver<String> {
        self.discovery_stats_tx.subscribe()
    }

    /// Append a notification, returning it with server-assigned identity and
    /// timestamps filled in. Callers (the Processor) publish it afterwards.
    pub async fn append(&self, notification: Notification) -> RuntimeResult<Notification> {
        // `id` is a `BIGSERIAL` (`int8`); fetch as `i64` and stringify rather
        // than asking sqlx to decode it straight into `Notification.id`'s
        // `Option<String>`, which it cannot coerce.
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO notifications
                (client_id, rule_id, type_id, title, message, payload, priority, status, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&notification.client_id)
        .bind(&notification.rule_id)
        .bind(&notification.type_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(Json(&notification.payload))
        .bind(Json(notification.priority))
        .bind(Json(notification.status))
        .bind(notification.created_at)
        .bind(notification.expires_at)
        .fetch_one(&self.pool)
        .await
        .owe(RuntimeReason::Sink)?;

        Ok(Notification {
            id: Some(row.0.to_string()),
            ..notification
        })
    }

    /// Publish a notification, scoped to its owning `clientId`. Broadcast
    /// failures (no subscribers, or a lagging one) never fail the append —
    /// the notification stays persisted regardless (§4.7).
    pub fn publish_notification(&self, notification: &Notification) {
        let envelope = NotificationEnvelope {
            client_id: &notification.client_id,
            notification,
        };
        self.publish(&self.notifications_tx, &envelope, "notifications");
    }

    pub fn publish_vessel_update(&self, record: &VesselRecord, now: DateTime<Utc>) {
        let envelope = VesselUpdateEnvelope {
            vessel: record,
            timestamp: now,
        };
        self.publish(&self.vessel_updates_tx, &envelope, "vessel-updates");
    }

    pub fn publish_discovery_stats(&self, counts: &DiscoveryCounts, now: DateTime<Utc>) {
        let envelope = DiscoveryStatsEnvelope {
            stats: counts,
            timestamp: now,
        };
        self.publish(&self.discovery_stats_tx, &envelope, "discovery-stats");
    }

    fn publish(&self, channel: &broadcast::Sender<String>, payload: &impl Serialize, name: &str) {
        let json = match serde_json::to_string(payload) {
            Ok(j) => j,
            Err(e) => {
                vn_warn!(res, channel = name, error = %e, "failed to encode broadcast payload");
                return;
            }
        };
        // send() only errors when there are no receivers; that's expected
        // when no downstream delivery layer is attached yet.
        let _ = channel.send(json);
    }
}
