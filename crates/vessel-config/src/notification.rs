use serde::Deserialize;

use crate::types::HumanDuration;

/// Notification Sink (C7) policy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// `expiresAt = createdAt + retention`, per §4.7. Policy only — a
    /// sweeper is left to operations.
    #[serde(default = "default_retention")]
    pub retention: HumanDuration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
        }
    }
}

fn default_retention() -> HumanDuration {
    "7d".parse().expect("hardcoded duration must parse")
}
