use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::VesselRecord;

/// The evaluator family a notification type dispatches to. A closed, additive
/// tagged variant — never a string matched by ad-hoc dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorKind {
    Geofence,
    Compare,
    Change,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTracking {
    pub enabled: bool,
}

/// A catalog-wide definition of a notification kind: which evaluator family
/// handles it, its default rendering template, and whether it needs
/// per-(rule,entity) state tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationType {
    pub type_id: String,
    pub data_source: String,
    pub evaluator: EvaluatorKind,
    pub template: Template,
    pub state_tracking: StateTracking,
}

/// Condition document shapes, one per evaluator family. Stored as `JSONB` in
/// the relational store and deserialized here at snapshot-build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceCondition {
    pub trigger_on: TriggerOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOn {
    Enter,
    Exit,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareCondition {
    pub field: String,
    pub operator: CompareOp,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChangeCondition {
    pub field: String,
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default)]
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    StartsWith,
    Changed,
    ChangedTo,
    ChangedFrom,
    ChangedBy,
    CrossedAbove,
    CrossedBelow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicConditionItem {
    pub id: String,
    pub field: String,
    pub operator: DynamicOperator,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub tolerance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicCondition {
    pub logic: Logic,
    pub conditions: Vec<DynamicConditionItem>,
}

/// The condition document attached to a rule, tagged by the evaluator family
/// of its notification type. Deserialized from the same `JSONB` column
/// regardless of shape; the tag comes from the joined [`NotificationType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Geofence(GeofenceCondition),
    Compare(CompareCondition),
    Change(ChangeCondition),
    Dynamic(DynamicCondition),
}

/// Optional set-membership filters. A rule matches a record only if every
/// non-empty filter set contains the record's corresponding field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuleFilters {
    #[serde(default)]
    pub imos: BTreeSet<i64>,
    #[serde(default)]
    pub vessel_types: BTreeSet<String>,
    #[serde(default)]
    pub vessel_classes: BTreeSet<String>,
    #[serde(default)]
    pub areas: BTreeSet<String>,
    #[serde(default)]
    pub vessel_names: BTreeSet<String>,
}

impl RuleFilters {
    /// Whether `record` passes every configured filter. An absent or empty
    /// filter set always passes.
    pub fn matches(&self, record: &VesselRecord) -> bool {
        if !self.imos.is_empty() && !self.imos.contains(&record.imo) {
            return false;
        }
        if !self.vessel_types.is_empty()
            && !record
                .vessel_type
                .as_deref()
                .is_some_and(|v| self.vessel_types.contains(v))
        {
            return false;
        }
        if !self.vessel_classes.is_empty()
            && !record
                .vessel_class
                .as_deref()
                .is_some_and(|v| self.vessel_classes.contains(v))
        {
            return false;
        }
        if !self.vessel_names.is_empty()
            && !record
                .vessel_name
                .as_deref()
                .is_some_and(|v| self.vessel_names.contains(v))
        {
            return false;
        }
        if !self.areas.is_empty() {
            let area_match = record
                .area_name
                .as_deref()
                .is_some_and(|v| self.areas.contains(v))
                || record
                    .area_name_level1
                    .as_deref()
                    .is_some_and(|v| self.areas.contains(v));
            if !area_match {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RuleSettings {
    #[serde(default)]
    pub template: Option<Template>,
}

/// A client-owned rule: which notification type it dispatches to, its
/// condition document, its filters, and an optional geofence reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRule {
    pub id: String,
    pub client_id: String,
    pub type_id: String,
    pub name: String,
    pub condition: Condition,
    #[serde(default)]
    pub filters: RuleFilters,
    #[serde(default)]
    pub settings: RuleSettings,
    pub is_active: bool,
    #[serde(default)]
    pub geofence_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(imo: i64, vessel_type: Option<&str>, area: Option<&str>) -> VesselRecord {
        VesselRecord {
            imo,
            latitude: None,
            longitude: None,
            speed: None,
            heading: None,
            course: None,
            draught: None,
            vessel_type: vessel_type.map(String::from),
            vessel_class: None,
            vessel_status: None,
            vessel_voyage_status: None,
            ais_destination: None,
            area_name: area.map(String::from),
            area_name_level1: None,
            is_seagoing: None,
            vessel_name: None,
            client_id: None,
            passthrough: Default::default(),
        }
    }

    #[test]
    fn empty_filters_match_every_record() {
        let filters = RuleFilters::default();
        assert!(filters.matches(&record_with(1, None, None)));
    }

    #[test]
    fn imo_filter_matches_only_listed_imos() {
        let mut filters = RuleFilters::default();
        filters.imos.insert(1);
        filters.imos.insert(2);
        assert!(filters.matches(&record_with(1, None, None)));
        assert!(!filters.matches(&record_with(3, None, None)));
    }

    #[test]
    fn areas_filter_matches_either_area_field() {
        let mut filters = RuleFilters::default();
        filters.areas.insert("Singapore Strait".into());
        assert!(filters.matches(&record_with(1, None, Some("Singapore Strait"))));
        assert!(!filters.matches(&record_with(1, None, Some("Other"))));
    }
}
