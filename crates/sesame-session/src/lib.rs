//! # Sesame Session
//!
//! Drives one web chat page through its login handshake and hands back a
//! live, authenticated [`Session`].
//!
//! - [`auth`] classifies the page as authenticated, waiting for a QR scan,
//!   or holding invalidated credentials.
//! - [`qr`] runs the QR challenge/response loop.
//! - [`bootstrap`] sequences the whole thing and owns the restart policy.

pub mod auth;
pub mod bootstrap;
pub mod collaborators;
pub mod credentials;
pub mod debug_info;
pub mod error;
pub mod qr;
pub mod race;
pub mod relay;
pub mod screenshot;
pub mod scripts;
pub mod session;
pub mod terminal;

pub use auth::AuthenticationResult;
pub use bootstrap::{BootstrapOutcome, Relaunches, RestartReason, SessionBootstrapper};
pub use collaborators::{
    ApiInjector, Collaborators, InjectionStage, License, LicenseManager, NoLicense, NoPatches,
    Patch, PatchManager, ProcessControl, ProcessExit, QrRelay, ScriptInjector, SessionBackup,
};
pub use credentials::{FileCredentialStore, SessionCredentials};
pub use debug_info::{AccountType, DebugInfo};
pub use error::{BootstrapError, CollaboratorError, CredentialsError};
pub use qr::{QrManager, QrOutcome};
pub use relay::HttpQrRelay;
pub use session::Session;
