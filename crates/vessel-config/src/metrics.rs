use serde::Deserialize;

use crate::types::HumanDuration;

/// Metrics exporter settings. When disabled, collection still happens (the
/// atomic counters are always live) but the Prometheus HTTP endpoint is not
/// bound and only the periodic summary log line is emitted.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_report_interval")]
    pub report_interval: HumanDuration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_listen(),
            report_interval: default_report_interval(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:9901".to_string()
}

fn default_report_interval() -> HumanDuration {
    "60s".parse().expect("hardcoded duration must parse")
}
