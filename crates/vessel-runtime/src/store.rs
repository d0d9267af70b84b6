use std::time::Duration;

use orion_error::prelude::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use vessel_config::RedisConfig;
use vessel_core::state::{RuleState, TrackedFields};

use crate::error::{RuntimeReason, RuntimeResult};

const FULL_STATE_TTL_SECS: u64 = 24 * 3600;

/// State Store (C3): per-entity tracked fields, per-`(rule, entity)`
/// transition state, the destination shadow copy, geofence flags, and the
/// process-wide positions snapshot — all backed by a single Redis connection
/// manager with automatic reconnection.
#[derive(Clone)]
pub struct StateStore {
    conn: ConnectionManager,
}

impl StateStore {
    pub async fn connect(config: &RedisConfig) -> RuntimeResult<Self> {
        let client = redis::Client::open(config.url.as_str()).owe(RuntimeReason::Store)?;
        let conn = client
            .get_connection_manager()
            .await
            .owe(RuntimeReason::Store)?;
        Ok(Self { conn })
    }

    /// Load `ruleState[ruleId, entityId]`, deserialized from its stored JSON
    /// document. `None` means this is the first evaluation for the pair.
    pub async fn get_rule_state(&self, rule_id: &str, imo: i64) -> RuntimeResult<Option<RuleState>> {
        let key = rule_state_key(rule_id, imo);
        let raw: Option<String> = self.conn.clone().get(&key).await.owe(RuntimeReason::Store)?;
        match raw {
            Some(s) => serde_json::from_str(&s)
                .map(Some)
                .owe(RuntimeReason::Store),
            None => Ok(None),
        }
    }

    /// Upsert `ruleState[ruleId, entityId]`. No TTL — bounded by rule
    /// lifecycle (§4.3), not time.
    pub async fn put_rule_state(&self, rule_id: &str, imo: i64, state: &RuleState) -> RuntimeResult<()> {
        let key = rule_state_key(rule_id, imo);
        let payload = serde_json::to_string(state).owe(RuntimeReason::Store)?;
        let _: () = self.conn.clone().set(&key, payload).await.owe(RuntimeReason::Store)?;
        Ok(())
    }

    /// Delete every `ruleState` entry for a deleted rule, across entities.
    /// Scans with a bounded cursor rather than `KEYS` to avoid blocking Redis.
    pub async fn delete_rule_states(&self, rule_id: &str) -> RuntimeResult<()> {
        let pattern = format!("ruleState:{rule_id}:*");
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .owe(RuntimeReason::Store)?;
            if !keys.is_empty() {
                let _: () = conn.del(&keys).await.owe(RuntimeReason::Store)?;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Load `fullState[IMO]` (the tracked-fields snapshot).
    pub async fn get_tracked_fields(&self, imo: i64) -> RuntimeResult<Option<TrackedFields>> {
        let key = full_state_key(imo);
        let raw: Option<String> = self.conn.clone().get(&key).await.owe(RuntimeReason::Store)?;
        match raw {
            Some(s) => serde_json::from_str(&s)
                .map(Some)
                .owe(RuntimeReason::Store),
            None => Ok(None),
        }
    }

    /// Upsert `fullState[IMO]` with the standard 24 h TTL.
    pub async fn put_tracked_fields(&self, imo: i64, snapshot: &TrackedFields) -> RuntimeResult<()> {
        let key = full_state_key(imo);
        let payload = serde_json::to_string(snapshot).owe(RuntimeReason::Store)?;
        let _: () = self
            .conn
            .clone()
            .set_ex(&key, payload, FULL_STATE_TTL_SECS)
            .await
            .owe(RuntimeReason::Store)?;
        Ok(())
    }

    /// Load `destination[IMO]`.
    pub async fn get_destination(&self, imo: i64) -> RuntimeResult<Option<String>> {
        let key = destination_key(imo);
        self.conn.clone().get(&key).await.owe(RuntimeReason::Store)
    }

    /// Upsert `destination[IMO]` with the same TTL as the tracked-fields
    /// snapshot it shadows.
    pub async fn put_destination(&self, imo: i64, destination: &str) -> RuntimeResult<()> {
        let key = destination_key(imo);
        let _: () = self
            .conn
            .clone()
            .set_ex(&key, destination, FULL_STATE_TTL_SECS)
            .await
            .owe(RuntimeReason::Store)?;
        Ok(())
    }

    /// Mirror the geofence flag under its own TTL-bearing key, for external
    /// readers that only need inside/outside without the full rule-state
    /// document.
    pub async fn put_geofence_flag(&self, imo: i64, geofence_id: &str, is_inside: bool) -> RuntimeResult<()> {
        let key = geofence_flag_key(imo, geofence_id);
        let value = if is_inside { "1" } else { "0" };
        let _: () = self
            .conn
            .clone()
            .set_ex(&key, value, FULL_STATE_TTL_SECS)
            .await
            .owe(RuntimeReason::Store)?;
        Ok(())
    }

    /// Upsert the positions snapshot hash entry for `IMO`.
    pub async fn put_position(&self, imo: i64, record_json: &str) -> RuntimeResult<()> {
        let _: () = self
            .conn
            .clone()
            .hset(POSITIONS_KEY, imo.to_string(), record_json)
            .await
            .owe(RuntimeReason::Store)?;
        Ok(())
    }

    /// Add a discovered value to the set for `dimension`. Idempotent.
    pub async fn add_discovery(
        &self,
        dimension: vessel_core::discovery::DiscoveryDimension,
        value: &str,
    ) -> RuntimeResult<()> {
        let _: () = self
            .conn
            .clone()
            .sadd(dimension.set_key(), value)
            .await
            .owe(RuntimeReason::Store)?;
        Ok(())
    }

    /// Cardinality of a discovery set, for the periodic `discovery-stats`
    /// publish and the `--info` admin query.
    pub async fn discovery_count(
        &self,
        dimension: vessel_core::discovery::DiscoveryDimension,
    ) -> RuntimeResult<u64> {
        self.conn
            .clone()
            .scard(dimension.set_key())
            .await
            .owe(RuntimeReason::Store)
    }

    /// Cardinalities for every discovery dimension at once, for the periodic
    /// `discovery-stats` broadcast (§4.2) and the `--info` admin query.
    pub async fn discovery_counts(&self) -> RuntimeResult<crate::metrics::DiscoveryCounts> {
        use vessel_core::discovery::DiscoveryDimension as D;
        Ok(crate::metrics::DiscoveryCounts {
            destinations: self.discovery_count(D::Destination).await?,
            areas: self.discovery_count(D::AreaName).await?,
            areas_level1: self.discovery_count(D::AreaNameLevel1).await?,
            vessel_types: self.discovery_count(D::VesselType).await?,
            vessel_classes: self.discovery_count(D::VesselClass).await?,
            voyage_statuses: self.discovery_count(D::VesselVoyageStatus).await?,
            vessels: self.discovery_count(D::Imo).await?,
        })
    }

    /// Reset semantics (§4.8): purge every per-entity container and every
    /// discovery set. Rule catalog rows and the relational store are
    /// untouched — only C3 state is wiped.
    pub async fn purge_all(&self) -> RuntimeResult<()> {
        let mut conn = self.conn.clone();
        for dim in vessel_core::discovery::DiscoveryDimension::ALL {
            let _: () = conn.del(dim.set_key()).await.owe(RuntimeReason::Store)?;
        }
        let _: () = conn.del(POSITIONS_KEY).await.owe(RuntimeReason::Store)?;

        for pattern in [
            "ruleState:*",
            "vessel:fullstate:*",
            "vessel:*:destination",
            "vessel:*:geofence:*",
        ] {
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(pattern)
                    .arg("COUNT")
                    .arg(200)
                    .query_async(&mut conn)
                    .await
                    .owe(RuntimeReason::Store)?;
                if !keys.is_empty() {
                    let _: () = conn.del(&keys).await.owe(RuntimeReason::Store)?;
                }
                cursor = next;
                if cursor == 0 {
                    break;
                }
            }
        }
        Ok(())
    }
}

const POSITIONS_KEY: &str = "vessels:positions";

/// `ruleState[ruleId, entityId]` has no literal key name in §6 (only the
/// relational `RuleState` table is named there, for schema/audit purposes);
/// the hot path keeps it in the state store per §4.3's container ownership,
/// so this key is this implementation's own convention.
fn rule_state_key(rule_id: &str, imo: i64) -> String {
    format!("ruleState:{rule_id}:{imo}")
}

fn full_state_key(imo: i64) -> String {
    format!("vessel:fullstate:{imo}")
}

fn destination_key(imo: i64) -> String {
    format!("vessel:{imo}:destination")
}

fn geofence_flag_key(imo: i64, geofence_id: &str) -> String {
    format!("vessel:{imo}:geofence:{geofence_id}")
}

/// Unused outside tests, but documents the intended TTL for callers reading
/// this module.
#[allow(dead_code)]
pub const fn full_state_ttl() -> Duration {
    Duration::from_secs(FULL_STATE_TTL_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_match_external_interface() {
        assert_eq!(rule_state_key("r1", 9000001), "ruleState:r1:9000001");
        assert_eq!(full_state_key(9000001), "vessel:fullstate:9000001");
        assert_eq!(destination_key(9000001), "vessel:9000001:destination");
        assert_eq!(
            geofence_flag_key(9000001, "gf-1"),
            "vessel:9000001:geofence:gf-1"
        );
    }

    #[test]
    fn positions_key_is_fixed() {
        assert_eq!(POSITIONS_KEY, "vessels:positions");
    }
}
