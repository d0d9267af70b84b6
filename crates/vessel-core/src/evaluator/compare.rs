use std::collections::BTreeMap;

use crate::evaluator::EvaluatorOutput;
use crate::record::VesselRecord;
use crate::rule::{CompareCondition, CompareOp};

/// Stateless scalar compare/threshold evaluator (§4.5.2). Fires on every
/// record satisfying the predicate — no debouncing.
pub fn evaluate(record: &VesselRecord, condition: &CompareCondition) -> EvaluatorOutput {
    let Some(current) = record.field_as_f64(&condition.field) else {
        return EvaluatorOutput::default();
    };

    let triggered = match condition.operator {
        CompareOp::Gt => current > condition.value,
        CompareOp::Gte => current >= condition.value,
        CompareOp::Lt => current < condition.value,
        CompareOp::Lte => current <= condition.value,
        CompareOp::Eq => (current - condition.value).abs() < f64::EPSILON,
    };

    let mut context = BTreeMap::new();
    if triggered {
        context.insert("field".to_string(), condition.field.clone());
        context.insert("operator".to_string(), format!("{:?}", condition.operator).to_lowercase());
        context.insert("threshold".to_string(), condition.value.to_string());
        context.insert("currentValue".to_string(), current.to_string());
    }

    EvaluatorOutput {
        triggered,
        transition: None,
        context,
        new_state: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_speed(speed: f64) -> VesselRecord {
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
            is_seagoing: None,
            vessel_name: None,
            client_id: None,
            passthrough: Default::default(),
        }
    }

    #[test]
    fn gt_triggers_on_every_matching_record() {
        let cond = CompareCondition {
            field: "Speed".into(),
            operator: CompareOp::Gt,
            value: 10.0,
        };
        assert!(evaluate(&record_with_speed(11.0), &cond).triggered);
        assert!(evaluate(&record_with_speed(12.0), &cond).triggered);
        assert!(!evaluate(&record_with_speed(9.0), &cond).triggered);
    }

    #[test]
    fn missing_field_never_triggers() {
        let cond = CompareCondition {
            field: "Draught".into(),
            operator: CompareOp::Gte,
            value: 1.0,
        };
        assert!(!evaluate(&record_with_speed(20.0), &cond).triggered);
    }
}
