use thiserror::Error;

/// Represents errors surfaced by a page implementation.
/// These errors are intended to be protocol-agnostic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PageError {
    /// Failed to establish or maintain a connection to the page's controlling endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An operation did not complete within the specified or default timeout period.
    #[error("Operation timed out")]
    Timeout,

    /// An error occurred in the underlying control protocol (e.g., the browser
    /// rejected a command or the session died mid-command).
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The page (or the browser hosting it) was closed while an operation was pending.
    #[error("Target closed")]
    TargetClosed,

    /// A script evaluated inside the page threw.
    #[error("Script error: {0}")]
    ScriptError(String),

    /// Invalid parameters were provided to a page method.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The requested operation is not supported by this page implementation.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// An internal error occurred within the page implementation. This may indicate a bug.
    #[error("Internal page error: {0}")]
    InternalError(String),

    /// Error related to launching the page or its browser.
    #[error("Failed to launch page: {0}")]
    LaunchError(String),

    /// Generic I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl PageError {
    /// Whether the connection to the page itself is gone, as opposed to a
    /// single operation failing.
    pub fn is_protocol_lost(&self) -> bool {
        match self {
            PageError::TargetClosed | PageError::ConnectionFailed(_) => true,
            PageError::ProtocolError(msg) => msg.contains("Target closed"),
            _ => false,
        }
    }
}

impl From<std::io::Error> for PageError {
    fn from(err: std::io::Error) -> Self {
        PageError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for PageError {
    fn from(err: serde_json::Error) -> Self {
        PageError::InternalError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_targets_count_as_protocol_loss() {
        assert!(PageError::TargetClosed.is_protocol_lost());
        assert!(PageError::ProtocolError("Protocol error (Runtime.callFunctionOn): Target closed.".into()).is_protocol_lost());
        assert!(!PageError::ScriptError("ReferenceError: Store is not defined".into()).is_protocol_lost());
        assert!(!PageError::Timeout.is_protocol_lost());
    }
}
