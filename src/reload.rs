//! Outbound live-reload signal.
//!
//! The dev server is not part of this crate; it only receives the literal
//! `"reload"` after each successful build cycle. This module bridges
//! `Reload` events on the bus to a broadcast channel the server subscribes
//! to.

use tokio::sync::broadcast;

use crate::bus::{EventBus, EventType, SubscriptionId};

/// Payload sent to live-update clients.
pub const RELOAD_MESSAGE: &str = "reload";

const CHANNEL_CAPACITY: usize = 16;

pub struct ReloadChannel {
    sender: broadcast::Sender<String>,
    subscription: SubscriptionId,
}

impl ReloadChannel {
    /// Subscribe to `Reload` events on `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        let tx = sender.clone();
        let subscription = bus.subscribe(EventType::Reload, move |event| {
            match tx.send(RELOAD_MESSAGE.to_string()) {
                Ok(clients) => {
                    crate::debug!("reload"; "notified {} clients ({})", clients, event.source);
                }
                Err(_) => crate::debug!("reload"; "no live-update clients"),
            }
        });
        Self {
            sender,
            subscription,
        }
    }

    /// New receiver for a live-update client.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Stop forwarding. Returns `false` if already detached.
    pub fn detach(&self, bus: &EventBus) -> bool {
        bus.unsubscribe(EventType::Reload, self.subscription)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bus::Event;

    #[tokio::test]
    async fn test_reload_event_reaches_clients() {
        let bus = EventBus::new(8);
        let channel = ReloadChannel::attach(&bus);
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();
        assert_eq!(channel.client_count(), 2);
        bus.start();

        bus.publish(Event::new(EventType::BuildCompleted, "test"));
        bus.publish(Event::new(EventType::Reload, "test"));

        for rx in [&mut first, &mut second] {
            let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(message, "reload");
        }
        // Only the reload event is forwarded
        assert!(first.try_recv().is_err());

        bus.stop().await;
    }

    #[tokio::test]
    async fn test_detach() {
        let bus = EventBus::new(8);
        let channel = ReloadChannel::attach(&bus);
        assert_eq!(bus.subscriber_count(EventType::Reload), 1);
        assert!(channel.detach(&bus));
        assert!(!channel.detach(&bus));
        assert_eq!(bus.subscriber_count(EventType::Reload), 0);
    }
}
