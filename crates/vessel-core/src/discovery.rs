use crate::record::VesselRecord;

/// The fixed set of enumerable dimensions the discovery recorder tracks
/// (§4.2). Each dimension maps to one field on the incoming record; values
/// are recorded verbatim (after trimming) so the catalog UI can offer them
/// back as filter choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiscoveryDimension {
    Destination,
    AreaName,
    AreaNameLevel1,
    VesselType,
    VesselClass,
    VesselVoyageStatus,
    Imo,
}

impl DiscoveryDimension {
    pub const ALL: [DiscoveryDimension; 7] = [
        DiscoveryDimension::Destination,
        DiscoveryDimension::AreaName,
        DiscoveryDimension::AreaNameLevel1,
        DiscoveryDimension::VesselType,
        DiscoveryDimension::VesselClass,
        DiscoveryDimension::VesselVoyageStatus,
        DiscoveryDimension::Imo,
    ];

    /// The state-store set key for this dimension (§6, literal key names).
    pub fn set_key(self) -> &'static str {
        match self {
            DiscoveryDimension::Destination => "discovered:destinations",
            DiscoveryDimension::AreaName => "discovered:areas",
            DiscoveryDimension::AreaNameLevel1 => "discovered:areas:level1",
            DiscoveryDimension::VesselType => "discovered:vesselTypes",
            DiscoveryDimension::VesselClass => "discovered:vesselClasses",
            DiscoveryDimension::VesselVoyageStatus => "discovered:voyageStatuses",
            DiscoveryDimension::Imo => "discovered:vessels",
        }
    }
}

/// Extract the discoverable value for `dimension` from `record`, trimmed and
/// filtered to non-empty. Blank or whitespace-only values are never recorded
/// — an empty `AISDestination` is not a destination.
pub fn extract(record: &VesselRecord, dimension: DiscoveryDimension) -> Option<String> {
    let raw = match dimension {
        DiscoveryDimension::Destination => record.ais_destination.as_deref(),
        DiscoveryDimension::AreaName => record.area_name.as_deref(),
        DiscoveryDimension::AreaNameLevel1 => record.area_name_level1.as_deref(),
        DiscoveryDimension::VesselType => record.vessel_type.as_deref(),
        DiscoveryDimension::VesselClass => record.vessel_class.as_deref(),
        DiscoveryDimension::VesselVoyageStatus => record.vessel_voyage_status.as_deref(),
        DiscoveryDimension::Imo => return Some(record.imo.to_string()),
    }?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extract every discoverable value present on `record`, paired with its
/// dimension. Dimensions with no value (or a blank one) are omitted.
pub fn extract_all(record: &VesselRecord) -> Vec<(DiscoveryDimension, String)> {
    DiscoveryDimension::ALL
        .into_iter()
        .filter_map(|dim| extract(record, dim).map(|v| (dim, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(destination: Option<&str>, area: Option<&str>) -> VesselRecord {
        VesselRecord {
            imo: 9000001,
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
            ais_destination: destination.map(String::from),
            area_name: area.map(String::from),
            area_name_level1: None,
            is_seagoing: None,
            vessel_name: None,
            client_id: None,
            passthrough: Default::default(),
        }
    }

    #[test]
    fn blank_destination_is_not_discovered() {
        let r = record_with(Some("   "), None);
        assert_eq!(extract(&r, DiscoveryDimension::Destination), None);
    }

    #[test]
    fn destination_is_trimmed() {
        let r = record_with(Some("  ROTTERDAM  "), None);
        assert_eq!(
            extract(&r, DiscoveryDimension::Destination).as_deref(),
            Some("ROTTERDAM")
        );
    }

    #[test]
    fn imo_is_always_discovered() {
        let r = record_with(None, None);
        assert_eq!(extract(&r, DiscoveryDimension::Imo).as_deref(), Some("9000001"));
    }

    #[test]
    fn extract_all_omits_absent_dimensions() {
        let r = record_with(Some("ROTTERDAM"), None);
        let found = extract_all(&r);
        assert!(found.contains(&(DiscoveryDimension::Destination, "ROTTERDAM".to_string())));
        assert!(!found.iter().any(|(d, _)| *d == DiscoveryDimension::AreaName));
    }
}
