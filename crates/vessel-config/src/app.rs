use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::catalog::CatalogConfig;
use crate::kafka::KafkaConfig;
use crate::logging::LoggingConfig;
use crate::metrics::MetricsConfig;
use crate::notification::NotificationConfig;
use crate::postgres::PostgresConfig;
use crate::redis::RedisConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AppConfigRaw {
    kafka: KafkaConfig,
    redis: RedisConfig,
    postgres: PostgresConfig,
    #[serde(default)]
    catalog: CatalogConfig,
    #[serde(default)]
    notification: NotificationConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

// ---------------------------------------------------------------------------
// AppConfig (resolved, validated)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppConfig {
    pub kafka: KafkaConfig,
    pub redis: RedisConfig,
    pub postgres: PostgresConfig,
    pub catalog: CatalogConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Read and parse a `config.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for AppConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a resolved, validated [`AppConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: AppConfigRaw = toml::from_str(toml_str)?;

        let config = AppConfig {
            kafka: raw.kafka,
            redis: raw.redis,
            postgres: raw.postgres,
            catalog: raw.catalog,
            notification: raw.notification,
            logging: raw.logging,
            metrics: raw.metrics,
        };

        validate::validate(&config)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::time::Duration;

    const FULL_TOML: &str = r#"
[kafka]
brokers = "localhost:9092"
topic = "vessel.state"
group_id = "vessel-engine"

[redis]
url = "redis://localhost:6379"

[postgres]
url = "postgres://localhost/vessel"

[catalog]
refresh_interval = "30s"
geofence_cache_ttl = "60s"

[notification]
retention = "7d"

[logging]
level = "debug"
format = "json"

[metrics]
enabled = true
listen = "127.0.0.1:9901"
report_interval = "60s"
"#;

    #[test]
    fn load_full_toml() {
        let cfg: AppConfig = FULL_TOML.parse().unwrap();
        assert_eq!(cfg.kafka.brokers, "localhost:9092");
        assert_eq!(cfg.kafka.client_id, "vessel-engine");
        assert_eq!(cfg.redis.pool_size, 8);
        assert_eq!(
            cfg.catalog.refresh_interval.as_duration(),
            Duration::from_secs(30)
        );
        assert_eq!(
            cfg.notification.retention.as_duration(),
            Duration::from_secs(7 * 86400)
        );
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert!(cfg.metrics.enabled);
    }

    #[test]
    fn defaults_fill_omitted_sections() {
        let toml = r#"
[kafka]
brokers = "localhost:9092"
topic = "vessel.state"
group_id = "vessel-engine"

[redis]
url = "redis://localhost:6379"

[postgres]
url = "postgres://localhost/vessel"
"#;
        let cfg: AppConfig = toml.parse().unwrap();
        assert_eq!(cfg.catalog.geofence_cache_ttl.to_string(), "60s");
        assert_eq!(cfg.notification.retention.to_string(), "7d");
        assert!(!cfg.metrics.enabled);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn missing_kafka_section_fails() {
        let toml = r#"
[redis]
url = "redis://localhost:6379"

[postgres]
url = "postgres://localhost/vessel"
"#;
        assert!(toml.parse::<AppConfig>().is_err());
    }

    #[test]
    fn empty_broker_list_rejected() {
        let toml = FULL_TOML.replace(
            r#"brokers = "localhost:9092""#,
            r#"brokers = """#,
        );
        assert!(toml.parse::<AppConfig>().is_err());
    }

    #[test]
    fn metrics_enabled_requires_valid_listen() {
        let toml = FULL_TOML.replace(
            r#"listen = "127.0.0.1:9901""#,
            r#"listen = "not-an-address""#,
        );
        assert!(toml.parse::<AppConfig>().is_err());
    }
}
