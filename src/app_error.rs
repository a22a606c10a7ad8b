use crate::detach::DetachError;
use crate::orchestrator::OrchestrateError;
use crate::rundir::AllocError;
use crate::status::StatusError;
use crate::workspace::RootError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    RuntimeFailure = 1,
    Usage = 2,
    Internal = 3,
}

#[derive(Debug)]
pub struct AppError {
    code: ExitCode,
    message: String,
}

impl AppError {
    pub fn usage<T: Into<String>>(message: T) -> Self {
        Self {
            code: ExitCode::Usage,
            message: message.into(),
        }
    }

    pub fn runtime<T: Into<String>>(message: T) -> Self {
        Self {
            code: ExitCode::RuntimeFailure,
            message: message.into(),
        }
    }

    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self {
            code: ExitCode::Internal,
            message: message.into(),
        }
    }

    pub fn code(&self) -> i32 {
        self.code as i32
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<RootError> for AppError {
    fn from(err: RootError) -> Self {
        AppError::usage(err.to_string())
    }
}

impl From<OrchestrateError> for AppError {
    fn from(err: OrchestrateError) -> Self {
        match err {
            OrchestrateError::InvalidRequest(_)
            | OrchestrateError::Alloc(AllocError::InvalidLabel(_)) => AppError::usage(err.to_string()),
            OrchestrateError::Alloc(AllocError::Exists(_))
            | OrchestrateError::NotReattachable { .. }
            | OrchestrateError::Mismatch { .. }
            | OrchestrateError::Claimed(_) => AppError::runtime(err.to_string()),
            OrchestrateError::Store(ref store) if store.is_corrupt_state() => {
                AppError::runtime(err.to_string())
            }
            _ => AppError::internal(err.to_string()),
        }
    }
}

impl From<DetachError> for AppError {
    fn from(err: DetachError) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<StatusError> for AppError {
    fn from(err: StatusError) -> Self {
        if err.is_not_found() {
            AppError::runtime(err.to_string())
        } else {
            AppError::internal(err.to_string())
        }
    }
}
