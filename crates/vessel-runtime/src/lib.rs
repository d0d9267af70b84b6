#[macro_use]
mod log_macros;

pub mod catalog;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod migrations;
pub mod processor;
pub mod signal;
pub mod sink;
pub mod source;
pub mod store;
pub mod tracing_init;

pub use error::{RuntimeError, RuntimeReason, RuntimeResult};
pub use lifecycle::{Engine, StartOptions, connect_postgres};
pub use source::{DEFAULT_TOPIC, metadata_consumer, partition_count, total_backlog};
