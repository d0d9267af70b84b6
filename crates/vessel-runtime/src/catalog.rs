use std::sync::Arc;

use arc_swap::ArcSwap;
use orion_error::prelude::*;
use sqlx::PgPool;
use sqlx::types::Json;
use tokio_util::sync::CancellationToken;

use vessel_config::CatalogConfig;
use vessel_core::geofence::Geofence;
use vessel_core::rule::{ClientRule, Condition, NotificationType, RuleFilters, RuleSettings};

use crate::error::{RuntimeReason, RuntimeResult};

const DATA_SOURCE: &str = "vessel.state";

/// One row of the Rule Catalog snapshot: a rule joined with its notification
/// type and, if referenced, its geofence (§4.4, §6 relational schema).
#[derive(Debug, Clone)]
pub struct CatalogRule {
    pub rule: ClientRule,
    pub notification_type: NotificationType,
    pub geofence: Option<Geofence>,
}

/// An immutable point-in-time view of the active rule set for
/// `dataSource = vessel.state`. Cheap to clone (wrapped in `Arc` by callers).
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    rules: Vec<CatalogRule>,
}

impl CatalogSnapshot {
    pub fn active_rules(&self) -> impl Iterator<Item = &CatalogRule> {
        self.rules.iter()
    }

    pub fn active_rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Intermediate row shape matching the joined SQL query below. `condition`,
/// `filters`, and `settings` are stored as `JSONB` and decoded directly into
/// typed values through `sqlx::types::Json` (§9 decided open question).
///
/// Built with `query_as` against a plain SQL string rather than the
/// compile-time-checked `query_as!` macro, since the latter requires a live
/// database connection (or a prepared `.sqlx` cache) at build time.
#[derive(sqlx::FromRow)]
struct RuleRow {
    id: String,
    client_id: String,
    type_id: String,
    name: String,
    condition: Json<Condition>,
    filters: Json<RuleFilters>,
    settings: Json<RuleSettings>,
    is_active: bool,
    geofence_id: Option<String>,
    nt_data_source: String,
    nt_evaluator: Json<vessel_core::rule::EvaluatorKind>,
    nt_template: Json<vessel_core::rule::Template>,
    nt_state_tracking: Json<vessel_core::rule::StateTracking>,
    gf_client_id: Option<String>,
    gf_name: Option<String>,
    gf_shape: Option<Json<vessel_core::geofence::GeofenceShape>>,
    gf_is_active: Option<bool>,
}

const FETCH_ACTIVE_RULES_SQL: &str = r#"
    SELECT
        cr.id               AS id,
        cr.client_id         AS client_id,
        cr.type_id           AS type_id,
        cr.name              AS name,
        cr.condition         AS condition,
        cr.filters           AS filters,
        cr.settings          AS settings,
        cr.is_active         AS is_active,
        cr.geofence_id       AS geofence_id,
        nt.data_source       AS nt_data_source,
        nt.evaluator         AS nt_evaluator,
        nt.template          AS nt_template,
        nt.state_tracking    AS nt_state_tracking,
        g.client_id          AS gf_client_id,
        g.name               AS gf_name,
        g.shape              AS gf_shape,
        g.is_active          AS gf_is_active
    FROM client_rules cr
    JOIN notification_types nt ON nt.type_id = cr.type_id
    LEFT JOIN geofences g ON g.id = cr.geofence_id
    WHERE cr.is_active = true AND nt.data_source = $1
"#;

async fn fetch_rows(pool: &PgPool) -> RuntimeResult<Vec<RuleRow>> {
    sqlx::query_as::<_, RuleRow>(FETCH_ACTIVE_RULES_SQL)
        .bind(DATA_SOURCE)
        .fetch_all(pool)
        .await
        .owe(RuntimeReason::Catalog)
}

fn build_snapshot(rows: Vec<RuleRow>) -> CatalogSnapshot {
    let rules = rows
        .into_iter()
        .map(|row| {
            let geofence = row.geofence_id.as_ref().and_then(|id| {
                let shape = row.gf_shape?.0;
                Some(Geofence {
                    id: id.clone(),
                    client_id: row.gf_client_id.clone().unwrap_or_default(),
                    name: row.gf_name.clone().unwrap_or_default(),
                    shape,
                    is_active: row.gf_is_active.unwrap_or(false),
                })
            });

            CatalogRule {
                rule: ClientRule {
                    id: row.id,
                    client_id: row.client_id,
                    type_id: row.type_id.clone(),
                    name: row.name,
                    condition: row.condition.0,
                    filters: row.filters.0,
                    settings: row.settings.0,
                    is_active: row.is_active,
                    geofence_id: row.geofence_id,
                },
                notification_type: NotificationType {
                    type_id: row.type_id,
                    data_source: row.nt_data_source,
                    evaluator: row.nt_evaluator.0,
                    template: row.nt_template.0,
                    state_tracking: row.nt_state_tracking.0,
                },
                geofence,
            }
        })
        .collect();
    CatalogSnapshot { rules }
}

/// Rule Catalog (C4): an atomically-swapped immutable snapshot handle backed
/// by a background refresher task, so evaluators never lock against a
/// concurrent refresh.
pub struct RuleCatalog {
    pool: PgPool,
    snapshot: ArcSwap<CatalogSnapshot>,
}

impl RuleCatalog {
    /// Build the initial snapshot eagerly so the engine never runs with an
    /// empty catalog due to a slow first refresh.
    pub async fn bootstrap(pool: PgPool) -> RuntimeResult<Arc<Self>> {
        let rows = fetch_rows(&pool).await?;
        let snapshot = build_snapshot(rows);
        vn_info!(res, rules = snapshot.active_rule_count(), "rule catalog bootstrapped");
        Ok(Arc::new(Self {
            pool,
            snapshot: ArcSwap::from_pointee(snapshot),
        }))
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.load_full()
    }

    /// Rebuild and atomically swap in a fresh snapshot. On failure the
    /// previous snapshot keeps serving (§4.4, §7 "Catalog refresh failure").
    pub async fn refresh(&self) -> RuntimeResult<()> {
        let rows = fetch_rows(&self.pool).await?;
        let snapshot = build_snapshot(rows);
        vn_debug!(res, rules = snapshot.active_rule_count(), "rule catalog refreshed");
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    /// Spawn the periodic refresher, honoring `catalog.refresh_interval`.
    pub fn spawn_refresh_task(
        self: Arc<Self>,
        config: CatalogConfig,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(config.refresh_interval.as_duration());
            tick.tick().await; // first tick fires immediately; bootstrap already loaded once
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        if let Err(e) = self.refresh().await {
                            vn_warn!(res, error = %e, "catalog refresh failed, continuing to serve previous snapshot");
                        }
                    }
                }
            }
            Ok(())
        })
    }
}
