pub mod app;
pub mod catalog;
pub mod kafka;
pub mod logging;
pub mod metrics;
pub mod notification;
pub mod postgres;
pub mod redis;
pub mod types;
pub mod validate;

pub use app::AppConfig;
pub use catalog::CatalogConfig;
pub use kafka::KafkaConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use metrics::MetricsConfig;
pub use notification::NotificationConfig;
pub use postgres::PostgresConfig;
pub use redis::RedisConfig;
pub use types::{ByteSize, HumanDuration};
