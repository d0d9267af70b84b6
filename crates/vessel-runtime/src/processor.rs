use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use orion_error::prelude::*;
use serde_json::Value;
use tokio::sync::Mutex;

use vessel_config::NotificationConfig;
use vessel_core::discovery;
use vessel_core::evaluator;
use vessel_core::notification::{Notification, Priority};
use vessel_core::record::VesselRecord;
use vessel_core::rule::Condition;
use vessel_core::state::{RuleState, TrackedFields};

use crate::catalog::{CatalogRule, RuleCatalog};
use crate::error::{RuntimeReason, RuntimeResult};
use crate::metrics::RuntimeMetrics;
use crate::sink::NotificationSink;
use crate::store::StateStore;

/// Number of in-process per-`IMO` shard locks (§5). Guards against a
/// misbehaving producer that doesn't key by `IMO`, on top of the documented
/// single-partition-per-`IMO` assumption.
const SHARD_COUNT: usize = 64;

/// Processor (C6): the per-record pipeline wiring the state store, rule
/// catalog, evaluator kernel, and notification sink together.
pub struct Processor {
    store: StateStore,
    catalog: Arc<RuleCatalog>,
    sink: Arc<NotificationSink>,
    metrics: Arc<RuntimeMetrics>,
    notification: NotificationConfig,
    shards: Vec<Mutex<()>>,
}

impl Processor {
    pub fn new(
        store: StateStore,
        catalog: Arc<RuleCatalog>,
        sink: Arc<NotificationSink>,
        metrics: Arc<RuntimeMetrics>,
        notification: NotificationConfig,
    ) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(())).collect();
        Self {
            store,
            catalog,
            sink,
            metrics,
            notification,
            shards,
        }
    }

    /// Run the full per-record pipeline (§4.6). A store failure on the
    /// shared steps (positions, discovery, tracked fields) fails the whole
    /// record, so the caller does not advance the source offset; a failure
    /// scoped to one rule is caught and logged, and the remaining rules
    /// still run.
    pub async fn process(&self, record: VesselRecord) -> RuntimeResult<()> {
        let shard = record.imo.rem_euclid(SHARD_COUNT as i64) as usize;
        let _guard = self.shards[shard].lock().await;

        let now = Utc::now();
        self.metrics.inc_records_consumed();

        // 1 + 2: positions snapshot and vessel-updates broadcast, valid coordinates only.
        if record.has_valid_position() {
            let json = serde_json::to_string(&record).owe(RuntimeReason::Store)?;
            self.store
                .put_position(record.imo, &json)
                .await
                .inspect_err(|_| self.metrics.inc_state_store_error())?;
            self.sink.publish_vessel_update(&record, now);
        }

        // 3: discovery sets.
        for (dimension, value) in discovery::extract_all(&record) {
            self.store
                .add_discovery(dimension, &value)
                .await
                .inspect_err(|_| self.metrics.inc_state_store_error())?;
        }

        // 4: rule catalog snapshot (cached internally by the catalog refresher).
        let snapshot = self.catalog.snapshot();
        self.metrics
            .inc_rules_evaluated(snapshot.active_rule_count() as u64);

        // Loaded once, ahead of step 7's overwrite, so the `dynamic` family
        // sees this record's predecessor rather than itself.
        let previous_tracked = self
            .store
            .get_tracked_fields(record.imo)
            .await
            .inspect_err(|_| self.metrics.inc_state_store_error())?;

        // 5: evaluate every active rule, isolated from one another.
        for catalog_rule in snapshot.active_rules() {
            if let Err(e) = self
                .evaluate_rule(&record, catalog_rule, previous_tracked.as_ref(), now)
                .await
            {
                self.metrics.inc_rule_error();
                vn_warn!(pipe, rule = %catalog_rule.rule.id, error = %e, "rule evaluation failed, skipping");
            }
        }

        // 6: destination shadow copy, observed by evaluators strictly as the
        // stale/previous value until the next record arrives.
        if let Some(destination) = record.ais_destination.as_deref() {
            self.store
                .put_destination(record.imo, destination)
                .await
                .inspect_err(|_| self.metrics.inc_state_store_error())?;
        }

        // 7: tracked-fields snapshot, now safe to overwrite.
        let snapshot_fields = TrackedFields::from_record(&record);
        self.store
            .put_tracked_fields(record.imo, &snapshot_fields)
            .await
            .inspect_err(|_| self.metrics.inc_state_store_error())?;

        Ok(())
    }

    /// Apply filters, dispatch to the evaluator named by the rule's
    /// notification type, persist any updated state, and emit a notification
    /// on trigger (§4.6 steps 5a-5e).
    async fn evaluate_rule(
        &self,
        record: &VesselRecord,
        catalog_rule: &CatalogRule,
        previous_tracked: Option<&TrackedFields>,
        now: chrono::DateTime<Utc>,
    ) -> RuntimeResult<()> {
        let rule = &catalog_rule.rule;
        if !rule.filters.matches(record) {
            return Ok(());
        }

        let tracking_enabled = catalog_rule.notification_type.state_tracking.enabled;

        let output = match &rule.condition {
            Condition::Geofence(condition) => {
                let Some(geofence) = &catalog_rule.geofence else {
                    vn_warn!(pipe, rule = %rule.id, "geofence rule has no attached geofence, skipping");
                    return Ok(());
                };
                let previous = if tracking_enabled {
                    self.load_rule_state(&rule.id, record.imo)
                        .await?
                        .and_then(|s| match s {
                            RuleState::Geofence { is_inside } => Some(is_inside),
                            RuleState::Change { .. } => None,
                        })
                } else {
                    None
                };
                evaluator::evaluate_geofence(record, geofence, condition, previous)
            }
            Condition::Compare(condition) => evaluator::evaluate_compare(record, condition),
            Condition::Change(condition) => {
                let previous = if tracking_enabled {
                    self.load_rule_state(&rule.id, record.imo)
                        .await?
                        .and_then(|s| match s {
                            RuleState::Change { value } => Some(value),
                            RuleState::Geofence { .. } => None,
                        })
                } else {
                    None
                };
                evaluator::evaluate_change(record, condition, previous.as_deref())
            }
            Condition::Dynamic(condition) => {
                evaluator::evaluate_dynamic(record, condition, previous_tracked)
            }
        };

        if tracking_enabled {
            if let Some(new_state) = &output.new_state {
                self.store
                    .put_rule_state(&rule.id, record.imo, new_state)
                    .await
                    .inspect_err(|_| self.metrics.inc_state_store_error())?;
                if let (Condition::Geofence(_), RuleState::Geofence { is_inside }) =
                    (&rule.condition, new_state)
                {
                    let Some(geofence) = &catalog_rule.geofence else {
                        return Ok(());
                    };
                    self.store
                        .put_geofence_flag(record.imo, &geofence.id, *is_inside)
                        .await
                        .inspect_err(|_| self.metrics.inc_state_store_error())?;
                }
            }
        }

        if !output.triggered {
            return Ok(());
        }
        self.metrics.inc_rule_match();

        let template = rule
            .settings
            .template
            .as_ref()
            .unwrap_or(&catalog_rule.notification_type.template);
        let now_rfc3339 = now.to_rfc3339();
        let (title, message) = evaluator::template::render(template, &output.context, record, &now_rfc3339);

        let payload: BTreeMap<String, Value> = output
            .context
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let notification = Notification::new(
            rule.client_id.clone(),
            rule.id.clone(),
            rule.type_id.clone(),
            title,
            message,
            payload,
            Priority::Normal,
            now,
        );
        let retention = chrono::Duration::from_std(self.notification.retention.as_duration())
            .unwrap_or_else(|_| chrono::Duration::days(vessel_core::notification::DEFAULT_RETENTION_DAYS));
        let notification = Notification {
            expires_at: now + retention,
            ..notification
        };

        match self.sink.append(notification).await {
            Ok(stored) => {
                self.metrics.inc_notification_emitted();
                self.sink.publish_notification(&stored);
            }
            Err(e) => {
                self.metrics.inc_notification_dropped();
                vn_warn!(res, rule = %rule.id, error = %e, "failed to persist notification, dropping");
            }
        }

        Ok(())
    }

    async fn load_rule_state(&self, rule_id: &str, imo: i64) -> RuntimeResult<Option<RuleState>> {
        self.store
            .get_rule_state(rule_id, imo)
            .await
            .inspect_err(|_| self.metrics.inc_state_store_error())
    }
}
