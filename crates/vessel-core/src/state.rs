use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::VesselRecord;

/// Opaque per-`(ruleId, entityId)` state produced and consumed by a single
/// evaluator family. Geofence rules track inside/outside; `change` rules
/// track the last-seen scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RuleState {
    Geofence { is_inside: bool },
    Change { value: String },
}

/// The fixed set of fields whose previous values are kept per `IMO` for the
/// `dynamic` evaluator family (§4.5.4).
pub const TRACKED_FIELDS: &[&str] = &[
    "VesselName",
    "Speed",
    "VesselVoyageStatus",
    "VesselStatus",
    "AISDestination",
    "AreaName",
    "AreaNameLevel1",
    "Heading",
    "Draught",
    "Course",
    "IsSeagoing",
];

/// A compact per-`IMO` snapshot of the tracked fields, stored with a 24 h TTL
/// in the state store. Serves every `dynamic` rule without per-rule
/// duplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrackedFields {
    pub values: BTreeMap<String, String>,
}

impl TrackedFields {
    /// Build a snapshot of the tracked fields from a record, dropping any
    /// field whose value is absent.
    pub fn from_record(record: &VesselRecord) -> Self {
        let mut values = BTreeMap::new();
        for field in TRACKED_FIELDS {
            if let Some(v) = record.field_as_string(field) {
                values.insert((*field).to_string(), v);
            }
        }
        Self { values }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_fields_snapshot_only_keeps_known_fields() {
        let record = crate::record::VesselRecord {
            imo: 1,
            latitude: None,
            longitude: None,
            speed: Some(12.0),
            heading: None,
            course: None,
            draught: None,
            vessel_type: None,
            vessel_class: None,
            vessel_status: None,
            vessel_voyage_status: None,
            ais_destination: Some("ROTTERDAM".into()),
            area_name: None,
            area_name_level1: None,
            is_seagoing: None,
            vessel_name: None,
            client_id: None,
            passthrough: Default::default(),
        };
        let snap = TrackedFields::from_record(&record);
        assert_eq!(snap.get("Speed"), Some("12"));
        assert_eq!(snap.get("AISDestination"), Some("ROTTERDAM"));
        assert_eq!(snap.get("Heading"), None);
    }
}
