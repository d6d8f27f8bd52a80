use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use actix::{Actor, Context, Handler, MessageResult, Recipient, Supervised};
use log::{debug, error, info, warn};

use super::messages::{GetMetrics, Publish, Subscribe, SubscriptionId, Unsubscribe};
use super::{Namespace, SessionEvent};
use crate::error::CoreError;

/// Fans published session events out to subscribed recipients.
///
/// Subscriptions are keyed by namespace; the `None` key receives every
/// event. Recipients whose mailbox is gone are dropped on the next delivery.
pub struct EventBusActor {
    subscribers: HashMap<Option<Namespace>, HashMap<SubscriptionId, Recipient<SessionEvent>>>,
    next_subscription_id: u64,
    metrics: BusMetrics,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct BusMetrics {
    pub events_received: u64,
    pub events_delivered: u64,
    pub delivery_errors: u64,
    pub active_subscriptions: usize,
    pub last_event_at: Option<SystemTime>,
    pub last_error_at: Option<SystemTime>,
}

impl Actor for EventBusActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("EventBusActor started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("EventBusActor stopped");
        self.subscribers.clear();
    }
}

impl Supervised for EventBusActor {
    fn restarting(&mut self, _ctx: &mut <Self as Actor>::Context) {
        warn!("EventBusActor is being restarted");
        self.subscribers.clear();
    }
}

impl Default for EventBusActor {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBusActor {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            next_subscription_id: 1,
            metrics: BusMetrics::default(),
        }
    }

    fn dispatch_event(&mut self, event: SessionEvent) {
        for key in [Some(event.namespace), None] {
            let Some(subscribers) = self.subscribers.get(&key) else {
                continue;
            };
            let mut failed_subscriptions = HashSet::new();

            for (id, subscriber) in subscribers {
                if !subscriber.connected() {
                    error!("Failed to deliver event to subscriber {}: recipient is gone", id.0);
                    failed_subscriptions.insert(*id);
                    self.metrics.delivery_errors += 1;
                    self.metrics.last_error_at = Some(SystemTime::now());
                } else {
                    subscriber.do_send(event.clone());
                    self.metrics.events_delivered += 1;
                }
            }

            // Clean up failed subscriptions
            if !failed_subscriptions.is_empty() {
                if let Some(subs) = self.subscribers.get_mut(&key) {
                    for id in failed_subscriptions {
                        subs.remove(&id);
                    }
                }
                self.update_subscription_metrics();
            }
        }
    }

    fn update_subscription_metrics(&mut self) {
        self.metrics.active_subscriptions = self.subscribers.values().map(|subs| subs.len()).sum();
    }
}

impl Handler<Publish> for EventBusActor {
    type Result = ();

    fn handle(&mut self, msg: Publish, _ctx: &mut Context<Self>) {
        let event = msg.0;
        debug!(
            "[{}] {}{}",
            event.session_id,
            event.namespace,
            event.tag.as_deref().map(|t| format!(".{}", t)).unwrap_or_default()
        );
        self.metrics.events_received += 1;
        self.metrics.last_event_at = Some(SystemTime::now());
        self.dispatch_event(event);
    }
}

impl Handler<Subscribe> for EventBusActor {
    type Result = Result<SubscriptionId, CoreError>;

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Context<Self>) -> Self::Result {
        let id = SubscriptionId(self.next_subscription_id);
        self.next_subscription_id += 1;

        self.subscribers
            .entry(msg.namespace)
            .or_default()
            .insert(id, msg.subscriber);

        self.update_subscription_metrics();

        Ok(id)
    }
}

impl Handler<Unsubscribe> for EventBusActor {
    type Result = Result<(), CoreError>;

    fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Context<Self>) -> Self::Result {
        for subscribers in self.subscribers.values_mut() {
            subscribers.remove(&msg.subscription_id);
        }

        // Clean up empty namespaces
        self.subscribers.retain(|_, subs| !subs.is_empty());
        self.update_subscription_metrics();

        Ok(())
    }
}

impl Handler<GetMetrics> for EventBusActor {
    type Result = MessageResult<GetMetrics>;

    fn handle(&mut self, _msg: GetMetrics, _ctx: &mut Context<Self>) -> Self::Result {
        MessageResult(self.metrics.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{ActorEventBus, EventBus};
    use actix::prelude::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct Collector {
        seen: Arc<Mutex<Vec<SessionEvent>>>,
    }

    impl Actor for Collector {
        type Context = Context<Self>;
    }

    impl Handler<SessionEvent> for Collector {
        type Result = ();

        fn handle(&mut self, msg: SessionEvent, _ctx: &mut Context<Self>) {
            self.seen.lock().unwrap().push(msg);
        }
    }

    #[derive(Message)]
    #[rtype(result = "usize")]
    struct Count;

    impl Handler<Count> for Collector {
        type Result = usize;

        fn handle(&mut self, _msg: Count, _ctx: &mut Context<Self>) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[actix_rt::test]
    async fn delivers_by_namespace_and_wildcard() {
        let bus = EventBusActor::new().start();
        let qr_seen = Arc::new(Mutex::new(Vec::new()));
        let all_seen = Arc::new(Mutex::new(Vec::new()));
        let qr = Collector { seen: qr_seen.clone() }.start();
        let all = Collector { seen: all_seen.clone() }.start();

        bus.send(Subscribe {
            namespace: Some(Namespace::Qr),
            subscriber: qr.clone().recipient(),
        })
        .await
        .unwrap()
        .unwrap();
        bus.send(Subscribe {
            namespace: None,
            subscriber: all.clone().recipient(),
        })
        .await
        .unwrap()
        .unwrap();

        let handle = ActorEventBus::new(bus.clone());
        handle
            .publish(SessionEvent::new("s1", Namespace::Qr, json!("2@abc")).with_tag("qrData"))
            .unwrap();
        handle.publish(SessionEvent::status("s1", "SUCCESS")).unwrap();

        let metrics = bus.send(GetMetrics).await.unwrap();
        assert_eq!(metrics.events_received, 2);
        assert_eq!(metrics.events_delivered, 3);
        assert_eq!(metrics.active_subscriptions, 2);

        assert_eq!(qr.send(Count).await.unwrap(), 1);
        assert_eq!(all.send(Count).await.unwrap(), 2);
        let qr_events = qr_seen.lock().unwrap();
        assert_eq!(qr_events[0].tag.as_deref(), Some("qrData"));
        assert_eq!(all_seen.lock().unwrap()[1].data, json!("SUCCESS"));
    }

    #[actix_rt::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBusActor::new().start();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let collector = Collector { seen: seen.clone() }.start();

        let id = bus
            .send(Subscribe {
                namespace: Some(Namespace::Startup),
                subscriber: collector.clone().recipient(),
            })
            .await
            .unwrap()
            .unwrap();
        bus.send(Unsubscribe { subscription_id: id }).await.unwrap().unwrap();

        bus.do_send(Publish(SessionEvent::status("s1", "Authenticating")));
        let metrics = bus.send(GetMetrics).await.unwrap();
        assert_eq!(metrics.events_received, 1);
        assert_eq!(metrics.events_delivered, 0);
        assert_eq!(metrics.active_subscriptions, 0);
        assert_eq!(collector.send(Count).await.unwrap(), 0);
    }
}
