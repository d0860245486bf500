use thiserror::Error;

/// Failures of the remote average sync (send on completion, fetch from the menu)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// No network association at call time; the call is never attempted
    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The endpoint answered but the payload lacks a numeric `average`
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Rejected student count entered on the keypad
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CountError {
    #[error("no digits entered")]
    Empty,

    #[error("student count must be positive")]
    Zero,

    #[error("student count {0} is out of range")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid endpoint {0:?}: {1}")]
    Endpoint(String, String),
}
