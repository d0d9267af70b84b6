//! Pure domain types and the evaluator kernel for vessel notification rules.
//!
//! This crate has no I/O: no Kafka, no Redis, no Postgres. Every type here is
//! plain data or a pure function, so the rule logic can be exercised without
//! standing up the runtime.

pub mod discovery;
pub mod error;
pub mod evaluator;
pub mod geofence;
pub mod notification;
pub mod record;
pub mod rule;
pub mod state;

pub use error::{CoreError, CoreReason, CoreResult};
pub use geofence::{Geofence, GeofenceShape};
pub use notification::{Notification, NotificationStatus, Priority};
pub use record::VesselRecord;
pub use rule::{ClientRule, Condition, NotificationType, RuleFilters};
pub use state::{RuleState, TrackedFields};
