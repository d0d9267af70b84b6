use std::collections::BTreeMap;

use crate::evaluator::wildcard;
use crate::evaluator::EvaluatorOutput;
use crate::record::VesselRecord;
use crate::rule::ChangeCondition;
use crate::state::RuleState;

/// The legacy scalar-change evaluator (§4.5.3), tracking one field's last
/// value per `(rule, IMO)`.
pub fn evaluate(
    record: &VesselRecord,
    condition: &ChangeCondition,
    previous: Option<&str>,
) -> EvaluatorOutput {
    let current = record.field_as_string(&condition.field);

    let new_state = current
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(|c| RuleState::Change { value: c.to_string() });

    let (Some(prev), Some(curr)) = (previous, current.as_deref()) else {
        return EvaluatorOutput {
            triggered: false,
            transition: None,
            context: BTreeMap::new(),
            new_state,
        };
    };

    if prev.is_empty() || curr.is_empty() || prev == curr {
        return EvaluatorOutput {
            triggered: false,
            transition: None,
            context: BTreeMap::new(),
            new_state,
        };
    }

    let from_ok = condition.from.is_empty() || wildcard::matches_any(&condition.from, prev);
    let to_ok = condition.to.is_empty() || wildcard::matches_any(&condition.to, curr);
    let triggered = from_ok && to_ok;

    let mut context = BTreeMap::new();
    if triggered {
        context.insert("field".to_string(), condition.field.clone());
        context.insert("previousValue".to_string(), prev.to_string());
        context.insert("currentValue".to_string(), curr.to_string());
    }

    EvaluatorOutput {
        triggered,
        transition: None,
        context,
        new_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_destination(dest: &str) -> VesselRecord {
        VesselRecord {
            imo: 1,
            latitude: None,
            longitude: None,
            speed: None,
            heading: None,
            course: None,
            draught: None,
            vessel_type: None,
            vessel_class: None,
            vessel_status: None,
            vessel_voyage_status: None,
            ais_destination: Some(dest.to_string()),
            area_name: None,
            area_name_level1: None,
            is_seagoing: None,
            vessel_name: None,
            client_id: None,
            passthrough: Default::default(),
        }
    }

    /// Scenario 2: destination change with a `to` filter.
    #[test]
    fn destination_change_matching_wildcard_to() {
        let cond = ChangeCondition {
            field: "AISDestination".into(),
            from: vec![],
            to: vec!["*SINGAPORE*".into()],
        };
        let out = evaluate(
            &record_with_destination("PORT OF SINGAPORE"),
            &cond,
            Some("ROTTERDAM"),
        );
        assert!(out.triggered);
        assert_eq!(out.context.get("previousValue").map(String::as_str), Some("ROTTERDAM"));
        assert_eq!(
            out.context.get("currentValue").map(String::as_str),
            Some("PORT OF SINGAPORE")
        );
    }

    #[test]
    fn first_observation_is_silent() {
        let cond = ChangeCondition {
            field: "AISDestination".into(),
            from: vec![],
            to: vec![],
        };
        let out = evaluate(&record_with_destination("ROTTERDAM"), &cond, None);
        assert!(!out.triggered);
        assert_eq!(out.new_state, Some(RuleState::Change { value: "ROTTERDAM".into() }));
    }

    #[test]
    fn unmatched_to_pattern_does_not_trigger() {
        let cond = ChangeCondition {
            field: "AISDestination".into(),
            from: vec![],
            to: vec!["*ROTTERDAM*".into()],
        };
        let out = evaluate(
            &record_with_destination("PORT OF SINGAPORE"),
            &cond,
            Some("HAMBURG"),
        );
        assert!(!out.triggered);
    }
}
