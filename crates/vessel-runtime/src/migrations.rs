use orion_error::prelude::*;
use sqlx::PgPool;

use crate::error::{RuntimeReason, RuntimeResult};

/// Ordered list of idempotent DDL statements for the relational schema named
/// in §6: `notification_types`, `geofences`, `client_rules`, `notifications`.
/// `RuleState` is named there too but is never created here — it lives in
/// the state store exclusively (see `store.rs::rule_state_key`'s doc comment
/// and DESIGN.md's "Decided Open Questions").
///
/// Run as plain statements rather than through `sqlx::migrate!`, which scans
/// a `migrations/` directory at compile time against a live database
/// connection; the plain-string approach here matches `catalog.rs`'s
/// `query_as` (vs. `query_as!`) choice for the same reason.
const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS notification_types (
        type_id         TEXT PRIMARY KEY,
        data_source     TEXT NOT NULL,
        evaluator       JSONB NOT NULL,
        template        JSONB NOT NULL,
        state_tracking  JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS geofences (
        id          TEXT PRIMARY KEY,
        client_id   TEXT NOT NULL,
        name        TEXT NOT NULL,
        shape       JSONB NOT NULL,
        is_active   BOOLEAN NOT NULL DEFAULT true
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS client_rules (
        id           TEXT PRIMARY KEY,
        client_id    TEXT NOT NULL,
        type_id      TEXT NOT NULL REFERENCES notification_types(type_id),
        name         TEXT NOT NULL,
        condition    JSONB NOT NULL,
        filters      JSONB NOT NULL,
        settings     JSONB NOT NULL,
        is_active    BOOLEAN NOT NULL DEFAULT true,
        geofence_id  TEXT REFERENCES geofences(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS client_rules_active_idx ON client_rules (is_active) WHERE is_active",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id          BIGSERIAL PRIMARY KEY,
        client_id   TEXT NOT NULL,
        rule_id     TEXT NOT NULL,
        type_id     TEXT NOT NULL,
        title       TEXT NOT NULL,
        message     TEXT NOT NULL,
        payload     JSONB NOT NULL,
        priority    JSONB NOT NULL,
        status      JSONB NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL,
        expires_at  TIMESTAMPTZ NOT NULL,
        read_at     TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS notifications_client_id_idx ON notifications (client_id, created_at DESC)",
];

/// Apply every statement in order. Safe to call on every startup — each
/// statement is `IF NOT EXISTS` or otherwise idempotent.
pub async fn run(pool: &PgPool) -> RuntimeResult<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .owe(RuntimeReason::Bootstrap)?;
    }
    vn_info!(conn, statements = STATEMENTS.len(), "relational schema ensured");
    Ok(())
}
