use actix::Message;

use super::{BusMetrics, Namespace, SessionEvent};
use crate::error::CoreError;

/// Message carrying an event into the bus
#[derive(Message, Debug)]
#[rtype(result = "()")]
pub struct Publish(pub SessionEvent);

/// Message for event subscription
#[derive(Message, Debug)]
#[rtype(result = "Result<SubscriptionId, CoreError>")]
pub struct Subscribe {
    /// `None` subscribes to every namespace.
    pub namespace: Option<Namespace>,
    pub subscriber: actix::Recipient<SessionEvent>,
}

/// Message for event unsubscription
#[derive(Message, Debug)]
#[rtype(result = "Result<(), CoreError>")]
pub struct Unsubscribe {
    pub subscription_id: SubscriptionId,
}

/// Snapshot of the bus delivery counters
#[derive(Message, Debug)]
#[rtype(result = "BusMetrics")]
pub struct GetMetrics;

/// Unique identifier for event subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);
