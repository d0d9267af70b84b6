use std::collections::BTreeMap;

use crate::evaluator::EvaluatorOutput;
use crate::geofence::Geofence;
use crate::record::VesselRecord;
use crate::rule::{GeofenceCondition, TriggerOn};
use crate::state::RuleState;

/// Geofence transition evaluator (§4.5.1).
///
/// `previous` is the stored `isInside` flag from the last evaluation, if
/// any. A `None` previous means this is the first observation for this
/// `(rule, IMO)` pair: the rule seeds state silently and never fires.
pub fn evaluate(
    record: &VesselRecord,
    geofence: &Geofence,
    condition: &GeofenceCondition,
    previous: Option<bool>,
) -> EvaluatorOutput {
    let is_inside_now = match (record.latitude, record.longitude) {
        (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
            geofence.contains(lat, lng)
        }
        _ => false,
    };

    let new_state = Some(RuleState::Geofence {
        is_inside: is_inside_now,
    });

    let Some(prev) = previous else {
        return EvaluatorOutput {
            triggered: false,
            transition: None,
            context: BTreeMap::new(),
            new_state,
        };
    };

    let transition = if !prev && is_inside_now {
        Some("entered")
    } else if prev && !is_inside_now {
        Some("exited")
    } else {
        None
    };

    let triggered = match (transition, condition.trigger_on) {
        (Some("entered"), TriggerOn::Enter | TriggerOn::Both) => true,
        (Some("exited"), TriggerOn::Exit | TriggerOn::Both) => true,
        _ => false,
    };

    let mut context = BTreeMap::new();
    if triggered {
        context.insert("isInside".to_string(), is_inside_now.to_string());
        context.insert("action".to_string(), transition.unwrap_or("").to_string());
        context.insert("geofenceId".to_string(), geofence.id.clone());
        context.insert("geofenceName".to_string(), geofence.name.clone());
    }

    EvaluatorOutput {
        triggered,
        transition,
        context,
        new_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::GeofenceShape;

    fn square_geofence() -> Geofence {
        Geofence {
            id: "g1".into(),
            client_id: "c1".into(),
            name: "square".into(),
            shape: GeofenceShape::Polygon {
                coordinates: vec![
                    [103.7, 1.2],
                    [103.9, 1.2],
                    [103.9, 1.4],
                    [103.7, 1.4],
                ],
            },
            is_active: true,
        }
    }

    fn record_at(lat: f64, lng: f64) -> VesselRecord {
        VesselRecord {
            imo: 9000001,
            latitude: Some(lat),
            longitude: Some(lng),
            speed: None,
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

    /// End-to-end scenario 1: geofence enter.
    #[test]
    fn first_observation_is_silent_second_enters() {
        let g = square_geofence();
        let cond = GeofenceCondition {
            trigger_on: TriggerOn::Enter,
        };

        let first = evaluate(&record_at(1.3, 103.6), &g, &cond, None);
        assert!(!first.triggered);
        assert_eq!(first.new_state, Some(RuleState::Geofence { is_inside: false }));

        let second = evaluate(&record_at(1.3, 103.8), &g, &cond, Some(false));
        assert!(second.triggered);
        assert_eq!(second.context.get("isInside").map(String::as_str), Some("true"));
        assert_eq!(second.context.get("action").map(String::as_str), Some("entered"));
    }

    /// Scenario 5: idempotent replay of the entering record produces no
    /// additional notification and leaves `isInside` at `true`.
    #[test]
    fn replaying_inside_record_does_not_retrigger() {
        let g = square_geofence();
        let cond = GeofenceCondition {
            trigger_on: TriggerOn::Enter,
        };
        let replay = evaluate(&record_at(1.3, 103.8), &g, &cond, Some(true));
        assert!(!replay.triggered);
        assert_eq!(replay.new_state, Some(RuleState::Geofence { is_inside: true }));
    }

    #[test]
    fn exit_only_fires_for_exit_trigger() {
        let g = square_geofence();
        let cond = GeofenceCondition {
            trigger_on: TriggerOn::Exit,
        };
        let exited = evaluate(&record_at(1.3, 103.6), &g, &cond, Some(true));
        assert!(exited.triggered);
        assert_eq!(exited.context.get("action").map(String::as_str), Some("exited"));

        let cond_enter_only = GeofenceCondition {
            trigger_on: TriggerOn::Enter,
        };
        let exited_not_wanted = evaluate(&record_at(1.3, 103.6), &g, &cond_enter_only, Some(true));
        assert!(!exited_not_wanted.triggered);
    }

    #[test]
    fn invalid_coordinates_short_circuit_to_outside() {
        let g = square_geofence();
        let cond = GeofenceCondition {
            trigger_on: TriggerOn::Both,
        };
        let out = evaluate(&record_at(f64::NAN, 103.8), &g, &cond, Some(true));
        assert_eq!(out.new_state, Some(RuleState::Geofence { is_inside: false }));
        assert!(out.triggered); // inside -> outside is an exit transition
    }
}
