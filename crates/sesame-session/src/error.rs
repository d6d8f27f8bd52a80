//! Errors raised while bootstrapping a session.

use crate::bootstrap::RestartReason;
use sesame_interfaces::PageError;
use thiserror::Error;

/// Terminal outcomes of a bootstrap. Recoverable conditions (invalidated
/// credentials, a failed validity check, a multi-device mismatch) restart
/// the bootstrap instead and never surface here unless restarts run out.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Failed to open page: {0}")]
    PageLaunch(#[source] PageError),

    /// The page never reached an injectable state and strict mode was requested.
    #[error("TOSBLOCK")]
    TosBlocked,

    /// The host account logged this session out and strict mode was requested.
    #[error("Session data expired, the host account most likely logged this session out")]
    SessionExpired,

    #[error("Auth Timeout. Consider increasing session.timeouts.auth_secs")]
    AuthTimeout,

    /// Authentication timed out while the page was trying to reach the phone.
    #[error("App Offline")]
    AppOffline,

    #[error("QR Timeout. Consider increasing session.timeouts.qr_secs")]
    QrTimeout,

    #[error("QR code limit reached")]
    QrLimitReached,

    /// The page or its browser went away.
    #[error("Connection to the page was lost: {0}")]
    ProtocolLost(String),

    #[error("Timed out waiting for the page: {0}")]
    Timeout(String),

    #[error("Page error: {0}")]
    Page(PageError),

    #[error("Gave up after {attempts} bootstrap attempts (last restart: {last_reason})")]
    RetriesExhausted {
        attempts: u32,
        last_reason: RestartReason,
    },

    /// Returned after the process was asked to terminate.
    #[error("Process terminated: {0}")]
    ProcessTerminated(String),

    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("Collaborator failed: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl BootstrapError {
    /// Timeout-class errors are subject to the kill-on-timeout policy.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BootstrapError::AuthTimeout
                | BootstrapError::AppOffline
                | BootstrapError::QrTimeout
                | BootstrapError::Timeout(_)
        )
    }
}

impl From<PageError> for BootstrapError {
    fn from(err: PageError) -> Self {
        if err.is_protocol_lost() {
            BootstrapError::ProtocolLost(err.to_string())
        } else if err == PageError::Timeout {
            BootstrapError::Timeout(err.to_string())
        } else {
            BootstrapError::Page(err)
        }
    }
}

impl From<serde_json::Error> for BootstrapError {
    fn from(err: serde_json::Error) -> Self {
        BootstrapError::Credentials(CredentialsError::Json(err))
    }
}

/// Failures of the external services the bootstrapper calls into.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        CollaboratorError::Http(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Session data is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Session data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session data file error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_pages_map_to_protocol_loss() {
        assert!(matches!(
            BootstrapError::from(PageError::TargetClosed),
            BootstrapError::ProtocolLost(_)
        ));
        assert!(BootstrapError::from(PageError::Timeout).is_timeout());
        assert!(matches!(
            BootstrapError::from(PageError::ScriptError("boom".into())),
            BootstrapError::Page(_)
        ));
    }

    #[test]
    fn only_timeouts_are_timeout_class() {
        assert!(BootstrapError::AuthTimeout.is_timeout());
        assert!(BootstrapError::QrTimeout.is_timeout());
        assert!(!BootstrapError::TosBlocked.is_timeout());
        assert!(!BootstrapError::SessionExpired.is_timeout());
    }
}
