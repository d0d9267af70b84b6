use std::collections::BTreeMap;

use crate::evaluator::EvaluatorOutput;
use crate::record::VesselRecord;
use crate::rule::{DynamicCondition, DynamicConditionItem, DynamicOperator, Logic};
use crate::state::TrackedFields;

/// Composite dynamic evaluator (§4.5.4): evaluates a set of per-field
/// conditions combined by AND/OR, against the record and the per-IMO
/// tracked-fields snapshot (not per-rule state).
pub fn evaluate(
    record: &VesselRecord,
    condition: &DynamicCondition,
    previous: Option<&TrackedFields>,
) -> EvaluatorOutput {
    let mut context = BTreeMap::new();
    let mut results = Vec::with_capacity(condition.conditions.len());

    for item in &condition.conditions {
        let result = evaluate_condition(record, item, previous);
        if result {
            context.insert(format!("condition_{}", item.id), "true".to_string());
        }
        if let Some(curr) = record.field_as_string(&item.field) {
            context.insert(item.field.clone(), curr);
        }
        if let Some(prev) = previous.and_then(|p| p.get(&item.field)) {
            context.insert(format!("previous_{}", item.field), prev.to_string());
        }
        results.push(result);
    }

    let triggered = match condition.logic {
        Logic::And => !results.is_empty() && results.iter().all(|r| *r),
        Logic::Or => results.iter().any(|r| *r),
    };

    EvaluatorOutput {
        triggered,
        transition: None,
        context: if triggered { context } else { BTreeMap::new() },
        new_state: None,
    }
}

fn evaluate_condition(
    record: &VesselRecord,
    item: &DynamicConditionItem,
    previous: Option<&TrackedFields>,
) -> bool {
    let current_str = record.field_as_string(&item.field);
    let previous_str = previous.and_then(|p| p.get(&item.field));

    match item.operator {
        DynamicOperator::Eq | DynamicOperator::Neq | DynamicOperator::Gt
        | DynamicOperator::Gte | DynamicOperator::Lt | DynamicOperator::Lte => {
            let Some(current) = record.field_as_f64(&item.field) else {
                return false;
            };
            let Some(target) = item.value.as_ref().and_then(|v| v.as_f64()) else {
                return false;
            };
            match item.operator {
                DynamicOperator::Eq => (current - target).abs() < f64::EPSILON,
                DynamicOperator::Neq => (current - target).abs() >= f64::EPSILON,
                DynamicOperator::Gt => current > target,
                DynamicOperator::Gte => current >= target,
                DynamicOperator::Lt => current < target,
                DynamicOperator::Lte => current <= target,
                _ => unreachable!(),
            }
        }
        DynamicOperator::In | DynamicOperator::NotIn => {
            let Some(current) = current_str else {
                return false;
            };
            let values = item.values.as_deref().unwrap_or(&[]);
            let is_member = values
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&current));
            match item.operator {
                DynamicOperator::In => is_member,
                DynamicOperator::NotIn => !is_member,
                _ => unreachable!(),
            }
        }
        DynamicOperator::Contains | DynamicOperator::StartsWith => {
            let Some(current) = current_str else {
                return false;
            };
            let Some(needle) = item.value.as_ref().and_then(|v| v.as_str()) else {
                return false;
            };
            let current = current.to_lowercase();
            let needle = needle.to_lowercase();
            match item.operator {
                DynamicOperator::Contains => current.contains(&needle),
                DynamicOperator::StartsWith => current.starts_with(&needle),
                _ => unreachable!(),
            }
        }
        DynamicOperator::Changed => {
            let (Some(prev), Some(curr)) = (previous_str, current_str.as_deref()) else {
                return false;
            };
            !prev.is_empty() && !curr.is_empty() && prev != curr
        }
        DynamicOperator::ChangedTo => {
            let (Some(prev), Some(curr)) = (previous_str, current_str.as_deref()) else {
                return false;
            };
            if prev.is_empty() || curr.is_empty() || prev == curr {
                return false;
            }
            item.values
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .any(|v| v.eq_ignore_ascii_case(curr))
        }
        DynamicOperator::ChangedFrom => {
            let (Some(prev), Some(curr)) = (previous_str, current_str.as_deref()) else {
                return false;
            };
            if prev.is_empty() || curr.is_empty() || prev == curr {
                return false;
            }
            item.values
                .as_deref()
                .unwrap_or(&[])
                .iter()
                .any(|v| v.eq_ignore_ascii_case(prev))
        }
        DynamicOperator::ChangedBy => {
            let Some(prev_str) = previous_str else {
                return false;
            };
            let Some(prev) = prev_str.parse::<f64>().ok().filter(|v| v.is_finite()) else {
                return false;
            };
            let Some(curr) = record.field_as_f64(&item.field) else {
                return false;
            };
            let Some(tol) = item.tolerance else {
                return false;
            };
            (curr - prev).abs() >= tol
        }
        DynamicOperator::CrossedAbove => {
            let Some(prev_str) = previous_str else {
                return false;
            };
            let Some(prev) = prev_str.parse::<f64>().ok().filter(|v| v.is_finite()) else {
                return false;
            };
            let Some(curr) = record.field_as_f64(&item.field) else {
                return false;
            };
            let Some(target) = item.value.as_ref().and_then(|v| v.as_f64()) else {
                return false;
            };
            prev <= target && curr > target
        }
        DynamicOperator::CrossedBelow => {
            let Some(prev_str) = previous_str else {
                return false;
            };
            let Some(prev) = prev_str.parse::<f64>().ok().filter(|v| v.is_finite()) else {
                return false;
            };
            let Some(curr) = record.field_as_f64(&item.field) else {
                return false;
            };
            let Some(target) = item.value.as_ref().and_then(|v| v.as_f64()) else {
                return false;
            };
            prev >= target && curr < target
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_with_speed_seagoing(speed: f64, seagoing: bool) -> VesselRecord {
        VesselRecord {
            imo: 1,
            latitude: None,
            longitude: None,
            speed: Some(speed),
            heading: None,
            course: None,
            draught: None,
            vessel_type: None,
            vessel_class: None,
            vessel_status: None,
            vessel_voyage_status: None,
            ais_destination: None,
            area_name: None,
            area_name_level1: None,
            is_seagoing: Some(seagoing),
            vessel_name: None,
            client_id: None,
            passthrough: Default::default(),
        }
    }

    fn tracked(speed: &str, seagoing: &str) -> TrackedFields {
        let mut values = std::collections::BTreeMap::new();
        values.insert("Speed".to_string(), speed.to_string());
        values.insert("IsSeagoing".to_string(), seagoing.to_string());
        TrackedFields { values }
    }

    /// Scenario 3: speed crossed_above 15, sequence 10,14,18,20 -> fires once.
    #[test]
    fn crossed_above_fires_only_on_the_crossing_record() {
        let cond = DynamicCondition {
            logic: Logic::And,
            conditions: vec![DynamicConditionItem {
                id: "c1".into(),
                field: "Speed".into(),
                operator: DynamicOperator::CrossedAbove,
                value: Some(json!(15.0)),
                values: None,
                tolerance: None,
            }],
        };

        // 10 -> 14: no previous speed tracked yet implies first record is None
        let out1 = evaluate(&record_with_speed_seagoing(14.0, true), &cond, Some(&tracked("10", "true")));
        assert!(!out1.triggered);

        // 14 -> 18: crosses
        let out2 = evaluate(&record_with_speed_seagoing(18.0, true), &cond, Some(&tracked("14", "true")));
        assert!(out2.triggered);

        // 18 -> 20: both above 15, no re-trigger
        let out3 = evaluate(&record_with_speed_seagoing(20.0, true), &cond, Some(&tracked("18", "true")));
        assert!(!out3.triggered);
    }

    #[test]
    fn crossed_above_never_triggers_without_previous() {
        let cond = DynamicCondition {
            logic: Logic::And,
            conditions: vec![DynamicConditionItem {
                id: "c1".into(),
                field: "Speed".into(),
                operator: DynamicOperator::CrossedAbove,
                value: Some(json!(15.0)),
                values: None,
                tolerance: None,
            }],
        };
        let out = evaluate(&record_with_speed_seagoing(20.0, true), &cond, None);
        assert!(!out.triggered);
    }

    /// Scenario 4: composite AND(Speed eq 0, IsSeagoing changed_from [true]).
    #[test]
    fn composite_and_requires_all_conditions() {
        let cond = DynamicCondition {
            logic: Logic::And,
            conditions: vec![
                DynamicConditionItem {
                    id: "c1".into(),
                    field: "Speed".into(),
                    operator: DynamicOperator::Eq,
                    value: Some(json!(0.0)),
                    values: None,
                    tolerance: None,
                },
                DynamicConditionItem {
                    id: "c2".into(),
                    field: "IsSeagoing".into(),
                    operator: DynamicOperator::ChangedFrom,
                    value: None,
                    values: Some(vec!["true".to_string()]),
                    tolerance: None,
                },
            ],
        };
        let previous = tracked("5", "true");
        let out = evaluate(&record_with_speed_seagoing(0.0, false), &cond, Some(&previous));
        assert!(out.triggered);
    }

    #[test]
    fn changed_by_never_triggers_on_first_observation() {
        let cond = DynamicCondition {
            logic: Logic::Or,
            conditions: vec![DynamicConditionItem {
                id: "c1".into(),
                field: "Speed".into(),
                operator: DynamicOperator::ChangedBy,
                value: None,
                values: None,
                tolerance: Some(5.0),
            }],
        };
        let out = evaluate(&record_with_speed_seagoing(20.0, true), &cond, None);
        assert!(!out.triggered);
    }
}
