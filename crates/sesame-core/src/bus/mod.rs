//! Namespaced publish/subscribe channel for session events.
//!
//! The session crates only see the [`EventBus`] trait. The default
//! implementation forwards every event to an [`EventBusActor`], which fans
//! it out to subscribed actix recipients.

mod actor;
mod messages;

pub use actor::{BusMetrics, EventBusActor};
pub use messages::{GetMetrics, Publish, Subscribe, SubscriptionId, Unsubscribe};

use crate::error::CoreError;
use actix::{Addr, Message};
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Debug};

/// Topics events are published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Namespace {
    /// Raw challenge, rendered image and share URL.
    #[serde(rename = "qr")]
    Qr,
    #[serde(rename = "sessionData")]
    SessionData,
    #[serde(rename = "sessionDataBase64")]
    SessionDataBase64,
    #[serde(rename = "DebugInfo")]
    DebugInfo,
    /// Human readable status updates and lifecycle keywords.
    #[serde(rename = "STARTUP")]
    Startup,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Qr => "qr",
            Namespace::SessionData => "sessionData",
            Namespace::SessionDataBase64 => "sessionDataBase64",
            Namespace::DebugInfo => "DebugInfo",
            Namespace::Startup => "STARTUP",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value published for a session.
#[derive(Message, Debug, Clone, PartialEq, Serialize)]
#[rtype(result = "()")]
pub struct SessionEvent {
    pub session_id: String,
    pub namespace: Namespace,
    /// Sub-topic inside the namespace, e.g. `qrData` or `qrUrl`.
    pub tag: Option<String>,
    pub data: Value,
}

impl SessionEvent {
    pub fn new(session_id: impl Into<String>, namespace: Namespace, data: impl Into<Value>) -> Self {
        Self {
            session_id: session_id.into(),
            namespace,
            tag: None,
            data: data.into(),
        }
    }

    /// A status line on the `STARTUP` namespace.
    pub fn status(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(session_id, Namespace::Startup, Value::String(text.into()))
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Publishes session events to outside consumers.
///
/// Implementations must preserve publish order per caller and be safe to
/// share between bootstrap attempts.
pub trait EventBus: Send + Sync + Debug {
    /// Publishes `event`.
    ///
    /// # Returns
    /// - `Ok(())` once the event is queued for delivery.
    /// - `Err(CoreError)` if the bus is unavailable.
    fn publish(&self, event: SessionEvent) -> Result<(), CoreError>;
}

/// [`EventBus`] backed by a running [`EventBusActor`].
#[derive(Clone)]
pub struct ActorEventBus {
    addr: Addr<EventBusActor>,
}

impl ActorEventBus {
    pub fn new(addr: Addr<EventBusActor>) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> &Addr<EventBusActor> {
        &self.addr
    }
}

impl Debug for ActorEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorEventBus")
            .field("connected", &self.addr.connected())
            .finish()
    }
}

impl EventBus for ActorEventBus {
    fn publish(&self, event: SessionEvent) -> Result<(), CoreError> {
        if !self.addr.connected() {
            return Err(CoreError::EventBus("event bus actor is not running".into()));
        }
        // Bursts of status updates must not be dropped by the bounded mailbox
        self.addr.do_send(Publish(event));
        Ok(())
    }
}
