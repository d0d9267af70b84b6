use serde::{Deserialize, Serialize};

/// Record Source (C1) connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    /// Comma-separated `host:port` bootstrap list.
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_client_id() -> String {
    "vessel-engine".to_string()
}
