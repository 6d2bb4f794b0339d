// # -----------------------------
// # crates/gateway/src/error.rs
// # -----------------------------
use crate::limits::OpKind;
use fsgate_common::{ServiceName, UnknownService};
use fsgate_sandbox::SandboxError;
use fsgate_tools::fs::FsError;

/// Coarse error families, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad arguments or a path the sandbox refuses. Not worth retrying.
    Input,
    /// Throttled; the caller may retry later.
    Capacity,
    Timeout,
    Policy,
    Internal,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Input => "input",
            ErrorClass::Capacity => "capacity",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Policy => "policy",
            ErrorClass::Internal => "internal",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Rate limit exceeded. Please retry later.")]
    RateLimited,
    #[error("Circuit open for {0} operation")]
    CircuitOpen(OpKind),
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),
    #[error("Denied by policy")]
    PolicyDenied,
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
    #[error(transparent)]
    UnknownService(#[from] UnknownService),
    #[error("Service directory for {0} does not exist")]
    ServiceMissing(ServiceName),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GateError::RateLimited | GateError::CircuitOpen(_) => ErrorClass::Capacity,
            GateError::Timeout(_) => ErrorClass::Timeout,
            GateError::PolicyDenied => ErrorClass::Policy,
            GateError::Sandbox(SandboxError::Io(_))
            | GateError::Fs(FsError::Io(_))
            | GateError::Internal(_) => ErrorClass::Internal,
            GateError::UnknownTool(_)
            | GateError::InvalidArgs(_)
            | GateError::UnknownService(_)
            | GateError::ServiceMissing(_)
            | GateError::Sandbox(_)
            | GateError::Fs(_) => ErrorClass::Input,
        }
    }
}
