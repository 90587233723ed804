use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::mpsc;

struct Listener {
    id: u64,
    channel: String,
    sender: mpsc::UnboundedSender<Value>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

type SharedRegistry = Mutex<Registry>;

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out point for host events.
///
/// Hosts emit into the hub; views call [`EventHub::listen`] and hold the
/// returned subscription for as long as they want events. Every subscription
/// owns an unbounded queue, so a slow reader never loses payloads.
#[derive(Clone, Default)]
pub struct EventHub {
    registry: Arc<SharedRegistry>,
}

impl EventHub {
    /// Emits a payload on `channel`, returning how many subscriptions got it.
    pub fn emit(&self, channel: &str, payload: Value) -> usize {
        let mut registry = lock(&self.registry);
        let mut delivered = 0;
        registry.listeners.retain(|listener| {
            if listener.channel != channel {
                return true;
            }
            match listener.sender.send(payload.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn listen(&self, channel: &str) -> EventSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push(Listener {
            id,
            channel: channel.to_string(),
            sender,
        });

        EventSubscription {
            id,
            channel: channel.to_string(),
            receiver,
            registry: Some(Arc::downgrade(&self.registry)),
        }
    }

    /// Number of live subscriptions across all channels.
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

/// Scoped subscription to one channel. Dropping it unsubscribes.
pub struct EventSubscription {
    id: u64,
    channel: String,
    receiver: mpsc::UnboundedReceiver<Value>,
    registry: Option<Weak<SharedRegistry>>,
}

impl EventSubscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next payload on this channel.
    ///
    /// Payloads already queued are still handed out after the hub is gone;
    /// `None` follows once the queue is drained.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    pub fn unlisten(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(registry) = self.registry.take() else {
            return;
        };
        if let Some(registry) = registry.upgrade() {
            lock(&registry)
                .listeners
                .retain(|listener| listener.id != self.id);
        }
        tracing::debug!(channel = %self.channel, "event subscription released");
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscription_only_sees_its_channel() {
        let hub = EventHub::default();
        let mut subscription = hub.listen("agent-event");

        assert_eq!(hub.emit("agent-error", json!("boom")), 0);
        assert_eq!(hub.emit("agent-event", json!({"type": "message"})), 1);

        assert_eq!(subscription.recv().await, Some(json!({"type": "message"})));
    }

    #[tokio::test]
    async fn recv_ends_when_hub_is_dropped() {
        let hub = EventHub::default();
        let mut subscription = hub.listen("agent-event");
        drop(hub);

        assert_eq!(subscription.recv().await, None);
    }

    #[tokio::test]
    async fn bursts_are_delivered_in_full_and_in_order() {
        let hub = EventHub::default();
        let mut subscription = hub.listen("agent-event");

        let expected: String = (0..1000).map(|index| format!("{index},")).collect();
        for index in 0..1000 {
            hub.emit(
                "agent-event",
                json!({"type": "message", "message": {"content": [{"text": format!("{index},")}]}}),
            );
        }
        drop(hub);

        let mut received = String::new();
        while let Some(payload) = subscription.recv().await {
            if let Some(text) = payload["message"]["content"][0]["text"].as_str() {
                received.push_str(text);
            }
        }
        assert_eq!(received, expected);
    }

    #[test]
    fn dropping_or_unlistening_releases_the_listener() {
        let hub = EventHub::default();
        let first = hub.listen("agent-event");
        let second = hub.listen("agent-event");
        assert_eq!(hub.listener_count(), 2);

        drop(first);
        assert_eq!(hub.listener_count(), 1);

        second.unlisten();
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(hub.emit("agent-event", json!(null)), 0);
    }

    #[test]
    fn subscription_outliving_the_hub_drops_cleanly() {
        let hub = EventHub::default();
        let subscription = hub.listen("agent-event");
        drop(hub);
        drop(subscription);
    }
}
