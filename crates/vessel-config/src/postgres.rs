use serde::{Deserialize, Serialize};

/// Relational store (Rule Catalog reads, C4; Notification Sink appends, C7)
/// connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_pool_size() -> u32 {
    8
}
