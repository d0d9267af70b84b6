use std::net::ToSocketAddrs;

use crate::app::AppConfig;

/// Internal validation, called automatically during `AppConfig::from_str` / `load`.
pub(crate) fn validate(config: &AppConfig) -> anyhow::Result<()> {
    if config.kafka.brokers.trim().is_empty() {
        anyhow::bail!("kafka.brokers must be non-empty");
    }
    if config.kafka.topic.trim().is_empty() {
        anyhow::bail!("kafka.topic must be non-empty");
    }
    if config.kafka.group_id.trim().is_empty() {
        anyhow::bail!("kafka.group_id must be non-empty");
    }

    if config.redis.pool_size == 0 {
        anyhow::bail!("redis.pool_size must be > 0");
    }
    if config.postgres.pool_size == 0 {
        anyhow::bail!("postgres.pool_size must be > 0");
    }

    if config.catalog.refresh_interval.as_duration().is_zero() {
        anyhow::bail!("catalog.refresh_interval must be > 0");
    }

    if config.notification.retention.as_duration().is_zero() {
        anyhow::bail!("notification.retention must be > 0");
    }

    if config.metrics.enabled {
        if config.metrics.listen.trim().is_empty() {
            anyhow::bail!("metrics.listen must be non-empty when metrics.enabled=true");
        }
        if config
            .metrics
            .listen
            .to_socket_addrs()
            .map_err(|e| anyhow::anyhow!("metrics.listen invalid: {e}"))?
            .next()
            .is_none()
        {
            anyhow::bail!("metrics.listen resolved to no socket address");
        }
    }

    Ok(())
}
