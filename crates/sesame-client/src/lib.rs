//! # Sesame Client Library
//!
//! This crate provides the main entry point for bootstrapping a session. It
//! ties together the page interface, the core configuration and event bus,
//! and the session state machine.
//!
//! Users supply a [`PageLauncher`] that opens the web client and an
//! [`ApiInjector`] that injects the client API, then call [`launch`] from
//! inside an actix system.

// Re-export the page API for implementors of launchers
pub use sesame_interfaces::{
    ConsoleLogLevel, ConsoleMessage, LaunchRequest, Page, PageError, PageEvent, PageLauncher,
    ScreenshotFormat, ScreenshotOptions, WaitOptions,
};

// Export value for event payloads
pub use serde_json::Value;

pub use sesame_core::{
    Config, EventBusActor, Namespace, SessionConfig, SessionEvent, Subscribe, SubscriptionId,
    Unsubscribe,
};

pub use sesame_session::{
    ApiInjector, BootstrapError, Collaborators, DebugInfo, LicenseManager, PatchManager, Relaunches,
    ProcessControl, QrRelay, ScriptInjector, Session, SessionBackup, SessionCredentials,
};

mod error;
mod launch;

pub use error::ClientError;
pub use launch::{Client, launch, launch_with_bus, start_event_bus};

#[cfg(test)]
mod tests {
    use super::*;

    // Test re-exports (compile-time check)
    #[allow(dead_code)]
    fn check_reexports() {
        let _e: PageError = PageError::Timeout;
        let _cfg: Config = Config::default();
        let _opts: WaitOptions = WaitOptions::default();
        let _injector: ScriptInjector = ScriptInjector::default();
    }

    #[test]
    fn client_errors_wrap_bootstrap_errors() {
        let err: ClientError = BootstrapError::QrLimitReached.into();
        assert_eq!(err.to_string(), "QR code limit reached");
    }

    #[test]
    fn event_bus_needs_an_actor_system() {
        assert!(matches!(start_event_bus(), Err(ClientError::ActorSystemError(_))));
    }
}
