use orion_error::{ErrorCode, StructError, UvsReason};

/// Reasons a [`vessel-core`](crate) operation can fail, with stable numeric
/// codes for log correlation across the crate boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error, derive_more::From)]
pub enum CoreReason {
    #[error("invalid geofence")]
    InvalidGeofence,
    #[error("evaluator error")]
    Evaluator,
    #[error("template render error")]
    Template,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for CoreReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::InvalidGeofence => 1001,
            Self::Evaluator => 1002,
            Self::Template => 1003,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type CoreError = StructError<CoreReason>;
pub type CoreResult<T> = Result<T, CoreError>;
