//! Notification hub — per-client pub/sub fan-out of engine events.

pub mod event;

pub use event::{CompletionSummary, EventPayload, NotificationEvent};

use std::collections::HashMap;

use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-client publish/subscribe channel for [`NotificationEvent`]s.
///
/// Backed by one tokio broadcast channel per client id. Delivery is
/// best-effort: a subscriber that falls more than the channel capacity
/// behind loses the overwritten events and is expected to reconcile via the
/// status query. Events published before a subscriber joined are not
/// replayed.
pub struct NotificationHub {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<NotificationEvent>>>,
    capacity: usize,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Register an observer for a client's events.
    ///
    /// The subscription yields events published after this call, in
    /// publication order. Dropping it (or calling
    /// [`Subscription::unsubscribe`]) detaches the observer.
    pub async fn subscribe(&self, client_id: Uuid) -> Subscription {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(client_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Subscription {
            client_id,
            rx: tx.subscribe(),
        }
    }

    /// Publish an event to every current observer of the client.
    ///
    /// Never blocks the caller; with no observers connected the event is
    /// simply dropped.
    pub async fn publish(&self, event: NotificationEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&event.client_id) {
            let delivered = tx.send(event.clone()).unwrap_or(0);
            debug!(
                client_id = %event.client_id,
                event_type = event.type_name(),
                observers = delivered,
                "Event published"
            );
        } else {
            debug!(
                client_id = %event.client_id,
                event_type = event.type_name(),
                "Event published with no observers"
            );
        }
    }

    /// Drop the channel for a client (administrative removal).
    /// Live subscriptions see their stream end.
    pub async fn remove(&self, client_id: Uuid) {
        self.channels.write().await.remove(&client_id);
    }

    /// Number of observers currently attached to a client.
    pub async fn observer_count(&self, client_id: Uuid) -> usize {
        self.channels
            .read()
            .await
            .get(&client_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop channels that have no attached observers and whose workflow no
    /// longer publishes. Called opportunistically by the engine.
    pub async fn prune(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// An observer's handle on one client's event stream.
pub struct Subscription {
    client_id: Uuid,
    rx: broadcast::Receiver<NotificationEvent>,
}

impl Subscription {
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the channel is closed. If this observer lagged
    /// behind, the overwritten events are skipped (logged) and the next
    /// available event is returned — callers resynchronize through the
    /// status query.
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(
                        client_id = %self.client_id,
                        missed,
                        "Observer lagged behind event stream; catch up via status query"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Adapt the subscription into a `Stream` of events, silently skipping
    /// lagged gaps.
    pub fn into_stream(self) -> impl Stream<Item = NotificationEvent> {
        BroadcastStream::new(self.rx).filter_map(|item| item.ok())
    }

    /// Detach this observer. Dropping the subscription has the same effect;
    /// this just makes the intent explicit at call sites.
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{StepId, StepStatus};

    fn step_event(client_id: Uuid, pct: u8) -> NotificationEvent {
        NotificationEvent::new(
            client_id,
            EventPayload::StepUpdate {
                step_id: StepId::CreateWorkspace,
                step_status: StepStatus::Completed,
                progress_percentage: pct,
                current_step: None,
                metadata: None,
            },
        )
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let hub = NotificationHub::default();
        let client_id = Uuid::new_v4();
        let mut sub = hub.subscribe(client_id).await;

        for pct in [13, 25, 38] {
            hub.publish(step_event(client_id, pct)).await;
        }

        for expected in [13, 25, 38] {
            let event = sub.recv().await.unwrap();
            match event.payload {
                EventPayload::StepUpdate {
                    progress_percentage, ..
                } => assert_eq!(progress_percentage, expected),
                _ => panic!("Expected StepUpdate"),
            }
        }
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let hub = NotificationHub::default();
        let client_id = Uuid::new_v4();

        // Keep one subscriber attached so the channel exists.
        let _early = hub.subscribe(client_id).await;
        hub.publish(step_event(client_id, 13)).await;

        let mut late = hub.subscribe(client_id).await;
        hub.publish(step_event(client_id, 25)).await;

        let event = late.recv().await.unwrap();
        match event.payload {
            EventPayload::StepUpdate {
                progress_percentage, ..
            } => assert_eq!(progress_percentage, 25),
            _ => panic!("Expected StepUpdate"),
        }
    }

    #[tokio::test]
    async fn events_are_isolated_per_client() {
        let hub = NotificationHub::default();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut sub_a = hub.subscribe(a).await;
        let _sub_b = hub.subscribe(b).await;

        hub.publish(step_event(b, 50)).await;
        hub.publish(step_event(a, 13)).await;

        // Subscriber A sees only client A's event.
        let event = sub_a.recv().await.unwrap();
        assert_eq!(event.client_id, a);
    }

    #[tokio::test]
    async fn publish_without_observers_does_not_block() {
        let hub = NotificationHub::default();
        hub.publish(step_event(Uuid::new_v4(), 0)).await;
    }

    #[tokio::test]
    async fn multiple_observers_all_receive() {
        let hub = NotificationHub::default();
        let client_id = Uuid::new_v4();
        let mut sub1 = hub.subscribe(client_id).await;
        let mut sub2 = hub.subscribe(client_id).await;
        assert_eq!(hub.observer_count(client_id).await, 2);

        hub.publish(step_event(client_id, 13)).await;

        assert!(sub1.recv().await.is_some());
        assert!(sub2.recv().await.is_some());
    }

    #[tokio::test]
    async fn unsubscribe_detaches_observer() {
        let hub = NotificationHub::default();
        let client_id = Uuid::new_v4();
        let sub = hub.subscribe(client_id).await;
        assert_eq!(hub.observer_count(client_id).await, 1);
        sub.unsubscribe();
        assert_eq!(hub.observer_count(client_id).await, 0);
    }

    #[tokio::test]
    async fn lagged_observer_skips_to_live_events() {
        let hub = NotificationHub::new(16);
        let client_id = Uuid::new_v4();
        let mut sub = hub.subscribe(client_id).await;

        // Overflow the 16-slot buffer.
        for pct in 0..40u8 {
            hub.publish(step_event(client_id, pct)).await;
        }

        // recv() skips the lag and yields one of the retained events.
        let event = sub.recv().await.unwrap();
        match event.payload {
            EventPayload::StepUpdate {
                progress_percentage, ..
            } => assert!(progress_percentage >= 24),
            _ => panic!("Expected StepUpdate"),
        }
    }

    #[tokio::test]
    async fn stream_adapter_yields_events() {
        let hub = NotificationHub::default();
        let client_id = Uuid::new_v4();
        let sub = hub.subscribe(client_id).await;

        hub.publish(step_event(client_id, 13)).await;

        let mut stream = Box::pin(sub.into_stream());
        let event = stream.next().await.unwrap();
        assert_eq!(event.client_id, client_id);
    }

    #[tokio::test]
    async fn remove_closes_subscriptions() {
        let hub = NotificationHub::default();
        let client_id = Uuid::new_v4();
        let mut sub = hub.subscribe(client_id).await;
        hub.remove(client_id).await;
        assert!(sub.recv().await.is_none());
    }
}
