//! Errors specific to the client launch logic.

use sesame_core::CoreError;
use sesame_session::{BootstrapError, CollaboratorError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration loading failed: {0}")]
    ConfigError(#[from] CoreError),

    #[error("Actor system failed to start: {0}")]
    ActorSystemError(String),

    #[error("QR relay setup failed: {0}")]
    RelayError(#[from] CollaboratorError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}
