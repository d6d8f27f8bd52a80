//! # Sesame Core
//!
//! Ambient building blocks shared by the session crates: layered
//! configuration, logging setup, core errors and the namespaced event bus
//! that surfaces QR codes, credentials and debug info to outside consumers.

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;

pub use bus::{
    ActorEventBus, EventBus, EventBusActor, Namespace, Publish, SessionEvent, Subscribe,
    SubscriptionId, Unsubscribe,
};
pub use config::{Config, GlobalConfig, LaunchConfig, QrConfig, RestartConfig, SessionConfig, TimeoutConfig};
pub use error::CoreError;
