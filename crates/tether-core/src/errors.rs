use std::time::Duration;

use crate::envelope::DecodeError;

/// Failure reported by a host capability (location service, camera,
/// resizer, file system, URL opener).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    #[error("operation rejected: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HostError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Position error codes as reported by the host location service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixErrorCode {
    /// Location is switched off or access was refused (host code 1).
    PermissionDenied,
    /// No fix could be obtained (host code 2).
    PositionUnavailable,
    /// The host's own deadline elapsed (host code 3).
    Timeout,
    /// Any other code the host invents.
    Other(i32),
}

impl FixErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::PermissionDenied => 1,
            Self::PositionUnavailable => 2,
            Self::Timeout => 3,
            Self::Other(c) => c,
        }
    }

    /// Whether this code means the location service itself is off.
    pub fn is_service_disabled(self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

/// A one-shot fix request that the host rejected.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("position error {code:?}: {message}")]
pub struct FixError {
    pub code: FixErrorCode,
    pub message: String,
}

impl FixError {
    pub fn new(code: FixErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error taxonomy of the bridge.
///
/// None of these terminate the process. Coordinators convert them into an
/// outbound envelope or a log line at their own boundary; the dispatcher
/// turns anything that escapes a handler into `Message_Error`.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("capability disabled: {0}")]
    CapabilityDisabled(String),
    #[error("capability failure: {0}")]
    CapabilityFailure(String),
    #[error("cleanup failed for {path}: {reason}")]
    ResourceCleanup { path: String, reason: String },
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl BridgeError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::CapabilityDisabled(_) => "capability_disabled",
            Self::CapabilityFailure(_) => "capability_failure",
            Self::ResourceCleanup { .. } => "resource_cleanup",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Timeouts are reported to the surface exactly like host failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::CapabilityFailure(_) | Self::Timeout(_))
    }
}

impl From<HostError> for BridgeError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Unavailable(msg) => Self::CapabilityDisabled(msg),
            other => Self::CapabilityFailure(other.to_string()),
        }
    }
}
