use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BridgeErrorCode {
    /// Wire arguments do not match the shape or count an action expects.
    MalformedArguments,
    /// The operation needs a tracker or container that does not exist yet.
    NotInitialized,
    /// A container exists but its last load did not succeed.
    ContainerUnavailable,
    /// The action name is not part of the dispatch table.
    UnhandledAction,
    /// The wrapped native client reported its own failure.
    ExternalSdkFailure,
    Internal,
}

impl BridgeErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeErrorCode::MalformedArguments => "bridge/malformed-arguments",
            BridgeErrorCode::NotInitialized => "bridge/not-initialized",
            BridgeErrorCode::ContainerUnavailable => "bridge/container-unavailable",
            BridgeErrorCode::UnhandledAction => "bridge/unhandled-action",
            BridgeErrorCode::ExternalSdkFailure => "bridge/external-sdk-failure",
            BridgeErrorCode::Internal => "bridge/internal",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BridgeError {
    pub code: BridgeErrorCode,
    message: String,
}

impl BridgeError {
    pub fn new(code: BridgeErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// The human readable message, without the code suffix. This is what reply sinks receive.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for BridgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for BridgeError {}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        malformed_arguments(format!("invalid wire arguments: {err}"))
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

pub fn malformed_arguments(message: impl Into<String>) -> BridgeError {
    BridgeError::new(BridgeErrorCode::MalformedArguments, message)
}

pub fn not_initialized(message: impl Into<String>) -> BridgeError {
    BridgeError::new(BridgeErrorCode::NotInitialized, message)
}

pub fn container_unavailable(message: impl Into<String>) -> BridgeError {
    BridgeError::new(BridgeErrorCode::ContainerUnavailable, message)
}

pub fn unhandled_action(action: &str) -> BridgeError {
    BridgeError::new(
        BridgeErrorCode::UnhandledAction,
        format!("action `{action}` is not supported by this bridge"),
    )
}

pub fn external_failure(message: impl Into<String>) -> BridgeError {
    BridgeError::new(BridgeErrorCode::ExternalSdkFailure, message)
}

pub fn internal_error(message: impl Into<String>) -> BridgeError {
    BridgeError::new(BridgeErrorCode::Internal, message)
}
