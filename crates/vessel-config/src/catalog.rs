use serde::Deserialize;

use crate::types::HumanDuration;

/// Rule Catalog (C4) refresh settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: HumanDuration,
    /// Cap on how long the Processor may reuse a cached snapshot for
    /// geofence lookups, per §4.4.
    #[serde(default = "default_geofence_cache_ttl")]
    pub geofence_cache_ttl: HumanDuration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            geofence_cache_ttl: default_geofence_cache_ttl(),
        }
    }
}

fn default_refresh_interval() -> HumanDuration {
    "30s".parse().expect("hardcoded duration must parse")
}

fn default_geofence_cache_ttl() -> HumanDuration {
    "60s".parse().expect("hardcoded duration must parse")
}
