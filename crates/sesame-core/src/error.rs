use thiserror::Error;

/// Specific errors originating strictly from the core crate logic.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration loading failed: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Logging setup failed: {0}")]
    LoggingSetup(String),

    /// The event bus actor could not be reached.
    #[error("Event bus error: {0}")]
    EventBus(String),
}

impl From<actix::MailboxError> for CoreError {
    fn from(err: actix::MailboxError) -> Self {
        CoreError::EventBus(err.to_string())
    }
}
