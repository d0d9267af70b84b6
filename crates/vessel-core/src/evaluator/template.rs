use std::collections::BTreeMap;

use crate::record::VesselRecord;
use crate::rule::Template;

/// Render a template's `{{key}}` placeholders against a context map merged
/// with the record's identity fields. Missing keys render as the literal
/// placeholder text — no escaping is performed. Deliberately a single-pass
/// string scan, not a general template engine.
pub fn render(template: &Template, context: &BTreeMap<String, String>, record: &VesselRecord, now: &str) -> (String, String) {
    let mut merged = identity_fields(record, now);
    for (k, v) in context {
        merged.insert(k.clone(), v.clone());
    }
    (substitute(&template.title, &merged), substitute(&template.message, &merged))
}

fn identity_fields(record: &VesselRecord, now: &str) -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("imo".to_string(), record.imo.to_string());
    if let Some(name) = &record.vessel_name {
        m.insert("vesselName".to_string(), name.clone());
    }
    if let Some(lat) = record.latitude {
        m.insert("latitude".to_string(), lat.to_string());
    }
    if let Some(lng) = record.longitude {
        m.insert("longitude".to_string(), lng.to_string());
    }
    if let Some(speed) = record.speed {
        m.insert("speed".to_string(), speed.to_string());
    }
    if let Some(dest) = &record.ais_destination {
        m.insert("destination".to_string(), dest.clone());
    }
    if let Some(status) = &record.vessel_status {
        m.insert("status".to_string(), status.clone());
    }
    m.insert("timestamp".to_string(), now.to_string());
    m
}

fn substitute(template: &str, context: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"{{") {
            if let Some(rel_end) = template[i + 2..].find("}}") {
                let key = &template[i + 2..i + 2 + rel_end];
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                i += 2 + rel_end + 2;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> VesselRecord {
        VesselRecord {
            imo: 9000001,
            latitude: Some(1.3),
            longitude: Some(103.8),
            speed: Some(12.0),
            heading: None,
            course: None,
            draught: None,
            vessel_type: None,
            vessel_class: None,
            vessel_status: Some("Underway".into()),
            vessel_voyage_status: None,
            ais_destination: Some("PORT OF SINGAPORE".into()),
            area_name: None,
            area_name_level1: None,
            is_seagoing: None,
            vessel_name: Some("MV Example".into()),
            client_id: None,
            passthrough: Default::default(),
        }
    }

    #[test]
    fn substitutes_context_and_identity_fields() {
        let template = Template {
            title: "{{vesselName}} update".into(),
            message: "{{vesselName}} ({{imo}}) destination {{destination}} at {{timestamp}}".into(),
        };
        let mut ctx = BTreeMap::new();
        ctx.insert("action".to_string(), "entered".to_string());
        let (title, message) = render(&template, &ctx, &record(), "2026-07-27T00:00:00Z");
        assert_eq!(title, "MV Example update");
        assert_eq!(
            message,
            "MV Example (9000001) destination PORT OF SINGAPORE at 2026-07-27T00:00:00Z"
        );
    }

    #[test]
    fn missing_key_renders_literal_placeholder() {
        let template = Template {
            title: "{{unknownKey}}".into(),
            message: "".into(),
        };
        let (title, _) = render(&template, &BTreeMap::new(), &record(), "now");
        assert_eq!(title, "{{unknownKey}}");
    }
}
