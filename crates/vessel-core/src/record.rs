use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single vessel position/state message consumed from the record source.
///
/// `IMO` is the stable entity identity. Coordinates may be absent or `NaN`
/// and must be treated as "no valid position" by every downstream
/// evaluator — see [`VesselRecord::has_valid_position`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselRecord {
    #[serde(rename = "IMO")]
    pub imo: i64,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(rename = "Speed")]
    pub speed: Option<f64>,
    #[serde(rename = "Heading")]
    pub heading: Option<f64>,
    #[serde(rename = "Course")]
    pub course: Option<f64>,
    #[serde(rename = "Draught")]
    pub draught: Option<f64>,
    #[serde(rename = "VesselType")]
    pub vessel_type: Option<String>,
    #[serde(rename = "VesselClass")]
    pub vessel_class: Option<String>,
    #[serde(rename = "VesselStatus")]
    pub vessel_status: Option<String>,
    #[serde(rename = "VesselVoyageStatus")]
    pub vessel_voyage_status: Option<String>,
    #[serde(rename = "AISDestination")]
    pub ais_destination: Option<String>,
    #[serde(rename = "AreaName")]
    pub area_name: Option<String>,
    #[serde(rename = "AreaNameLevel1")]
    pub area_name_level1: Option<String>,
    #[serde(rename = "IsSeagoing")]
    pub is_seagoing: Option<bool>,
    #[serde(rename = "VesselName")]
    pub vessel_name: Option<String>,
    #[serde(rename = "ClientId", default)]
    pub client_id: Option<String>,
    /// Fields not modeled above, carried through opaquely for template
    /// rendering and rule `condition.field` lookups.
    #[serde(flatten)]
    pub passthrough: BTreeMap<String, Value>,
}

impl VesselRecord {
    /// A position is valid iff both coordinates are present and finite.
    pub fn has_valid_position(&self) -> bool {
        matches!(
            (self.latitude, self.longitude),
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite()
        )
    }

    /// Look up a scalar field by its external (PascalCase) name, covering
    /// both the strongly-typed fields and the passthrough map. Returns the
    /// value rendered as a string, the representation every evaluator and
    /// the template engine operate on.
    pub fn field_as_string(&self, field: &str) -> Option<String> {
        let value = match field {
            "IMO" => return Some(self.imo.to_string()),
            "Latitude" => self.latitude.map(|v| v.to_string()),
            "Longitude" => self.longitude.map(|v| v.to_string()),
            "Speed" => self.speed.map(|v| v.to_string()),
            "Heading" => self.heading.map(|v| v.to_string()),
            "Course" => self.course.map(|v| v.to_string()),
            "Draught" => self.draught.map(|v| v.to_string()),
            "VesselType" => self.vessel_type.clone(),
            "VesselClass" => self.vessel_class.clone(),
            "VesselStatus" => self.vessel_status.clone(),
            "VesselVoyageStatus" => self.vessel_voyage_status.clone(),
            "AISDestination" => self.ais_destination.clone(),
            "AreaName" => self.area_name.clone(),
            "AreaNameLevel1" => self.area_name_level1.clone(),
            "IsSeagoing" => self.is_seagoing.map(|v| v.to_string()),
            "VesselName" => self.vessel_name.clone(),
            "ClientId" => self.client_id.clone(),
            other => self
                .passthrough
                .get(other)
                .map(|v| value_to_plain_string(v)),
        };
        value
    }

    /// Look up a field as a numeric scalar, for the `compare` and `dynamic`
    /// evaluators' numeric operators. Returns `None` if absent or not
    /// parseable as a finite number.
    pub fn field_as_f64(&self, field: &str) -> Option<f64> {
        self.field_as_string(field)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

fn value_to_plain_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_record() -> VesselRecord {
        VesselRecord {
            imo: 9000001,
            latitude: Some(1.3),
            longitude: Some(103.8),
            speed: Some(12.5),
            heading: Some(90.0),
            course: Some(91.0),
            draught: Some(8.2),
            vessel_type: Some("Cargo".into()),
            vessel_class: Some("Bulk".into()),
            vessel_status: Some("Underway".into()),
            vessel_voyage_status: Some("InTransit".into()),
            ais_destination: Some("PORT OF SINGAPORE".into()),
            area_name: Some("Singapore Strait".into()),
            area_name_level1: Some("SEA".into()),
            is_seagoing: Some(true),
            vessel_name: Some("MV Example".into()),
            client_id: Some("client-1".into()),
            passthrough: BTreeMap::new(),
        }
    }

    #[test]
    fn valid_position_requires_both_finite_coordinates() {
        let mut r = base_record();
        assert!(r.has_valid_position());
        r.latitude = Some(f64::NAN);
        assert!(!r.has_valid_position());
        r.latitude = Some(1.3);
        r.longitude = None;
        assert!(!r.has_valid_position());
    }

    #[test]
    fn field_as_string_covers_typed_and_passthrough_fields() {
        let mut r = base_record();
        r.passthrough
            .insert("CustomFlag".into(), Value::String("abc".into()));
        assert_eq!(r.field_as_string("AISDestination").as_deref(), Some("PORT OF SINGAPORE"));
        assert_eq!(r.field_as_string("IMO").as_deref(), Some("9000001"));
        assert_eq!(r.field_as_string("CustomFlag").as_deref(), Some("abc"));
        assert_eq!(r.field_as_string("NoSuchField"), None);
    }

    #[test]
    fn field_as_f64_parses_numeric_fields_only() {
        let r = base_record();
        assert_eq!(r.field_as_f64("Speed"), Some(12.5));
        assert_eq!(r.field_as_f64("VesselName"), None);
    }
}
