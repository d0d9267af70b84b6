use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};
use vessel_core::CoreReason;

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum RuntimeReason {
    #[error("bootstrap error")]
    Bootstrap,
    #[error("record source error")]
    Source,
    #[error("state store error")]
    Store,
    #[error("rule catalog error")]
    Catalog,
    #[error("notification sink error")]
    Sink,
    #[error("shutdown error")]
    Shutdown,
    #[error("{0}")]
    Core(CoreReason),
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for RuntimeReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::Bootstrap => 3001,
            Self::Source => 3002,
            Self::Store => 3003,
            Self::Catalog => 3004,
            Self::Sink => 3005,
            Self::Shutdown => 3006,
            Self::Core(c) => c.error_code(),
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type RuntimeError = StructError<RuntimeReason>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
