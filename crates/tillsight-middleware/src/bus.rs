//! Headless, typed, topic-based publish/subscribe status bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  The bus is how synchronous listener callbacks reach async
//! consumers: [`EventBus::status_listener`] and [`EventBus::alert_listener`]
//! build callbacks that republish onto a topic.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Status`] | Refreshed [`UnifiedStatus`] snapshots |
//! | [`Topic::Alerts`] | Battery threshold alerts |
//! | [`Topic::Lifecycle`] | Monitoring started / stopped |

use tillsight_types::{Alert, Event, EventPayload, UnifiedStatus};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Status,
    Alerts,
    Lifecycle,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("no subscribers for topic {0:?}")]
    NoSubscribers(Topic),
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    status: broadcast::Sender<Event>,
    alerts: broadcast::Sender<Event>,
    lifecycle: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (status, _) = broadcast::channel(capacity);
        let (alerts, _) = broadcast::channel(capacity);
        let (lifecycle, _) = broadcast::channel(capacity);
        Self {
            status,
            alerts,
            lifecycle,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, BusError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| BusError::NoSubscribers(topic))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// A listener callback that republishes every status it receives on
    /// [`Topic::Status`].
    pub fn status_listener(
        &self,
        source: impl Into<String>,
    ) -> impl Fn(&UnifiedStatus) + Send + Sync + 'static {
        let bus = self.clone();
        let source = source.into();
        move |status: &UnifiedStatus| {
            let event = Event::new(source.clone(), EventPayload::Status(Box::new(status.clone())));
            bus.publish_quietly(Topic::Status, event);
        }
    }

    /// A listener callback that republishes every alert on [`Topic::Alerts`].
    pub fn alert_listener(
        &self,
        source: impl Into<String>,
    ) -> impl Fn(&Alert) + Send + Sync + 'static {
        let bus = self.clone();
        let source = source.into();
        move |alert: &Alert| {
            let event = Event::new(source.clone(), EventPayload::Alert(alert.clone()));
            bus.publish_quietly(Topic::Alerts, event);
        }
    }

    /// Publish, treating an empty topic as a normal condition.
    pub fn publish_quietly(&self, topic: Topic, event: Event) {
        if let Err(e) = self.publish_to(topic, event) {
            debug!(error = %e, "bus event dropped");
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Status => &self.status,
            Topic::Alerts => &self.alerts,
            Topic::Lifecycle => &self.lifecycle,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns `None` once the bus has shut down.  Lagging subscribers skip
    /// the dropped events and keep receiving.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive, used by pollers that drain between prompts.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillsight_types::AlertKind;

    fn make_event(source: &str) -> Event {
        Event::new(source, EventPayload::MonitoringStopped)
    }

    #[test]
    fn publish_without_subscribers_returns_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Status, make_event("test"));
        assert!(matches!(result, Err(BusError::NoSubscribers(Topic::Status))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut sub1 = bus.subscribe_to(Topic::Lifecycle);
        let mut sub2 = bus.subscribe_to(Topic::Lifecycle);

        let event = make_event("tillsight-runtime::monitor");
        assert_eq!(bus.publish_to(Topic::Lifecycle, event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap().id, event.id);
        assert_eq!(sub2.recv().await.unwrap().id, event.id);
    }

    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::Alerts);
        let _status = bus.subscribe_to(Topic::Status);

        bus.publish_to(Topic::Status, make_event("monitor")).unwrap();

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), alerts.recv()).await;
        assert!(result.is_err(), "Alerts subscriber must not receive a Status event");
    }

    #[tokio::test]
    async fn alert_listener_republishes_on_alert_topic() {
        let bus = EventBus::default();
        let mut alerts = bus.subscribe_to(Topic::Alerts);
        let listener = bus.alert_listener("tillsight-hal::battery");

        listener(&Alert::new(AlertKind::CriticalBattery, Some(0.04), "Battery critical"));

        let event = alerts.recv().await.unwrap();
        assert_eq!(event.source, "tillsight-hal::battery");
        assert!(matches!(
            event.payload,
            EventPayload::Alert(ref a) if a.kind == AlertKind::CriticalBattery
        ));
    }

    #[test]
    fn status_listener_without_subscribers_is_silent() {
        let bus = EventBus::default();
        let listener = bus.status_listener("monitor");
        // No receivers: must not panic.
        listener(&UnifiedStatus::fallback("boot"));
    }

    #[test]
    fn try_recv_drains_then_returns_none() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Lifecycle);
        bus.publish_to(Topic::Lifecycle, make_event("a")).unwrap();
        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_none());
        assert_eq!(rx.topic(), Topic::Lifecycle);
    }
}
