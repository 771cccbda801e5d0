//! Per-chat event fan-out.
//!
//! `ChatChannel` broadcasts [`ChatEvent`]s to zero or more live listeners
//! keyed by chat id. Publishing never blocks: each subscriber gets its own
//! unbounded queue, a dead subscriber is pruned instead of failing the
//! publish, and there is no backlog — events published before a subscriber
//! arrives are simply lost (front-ends fetch the current chat state before
//! subscribing).
//!
//! Subscriptions are scoped: dropping the [`Subscription`] guard
//! deregisters the listener, including on task cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::event::ChatEvent;

type Topic = String;
type Subscribers = HashMap<Uuid, mpsc::UnboundedSender<ChatEvent>>;

/// Topic-keyed publish/subscribe channel for chat events.
#[derive(Clone, Default)]
pub struct ChatChannel {
    topics: Arc<Mutex<HashMap<Topic, Subscribers>>>,
}

impl ChatChannel {
    /// Create a new, empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to every current subscriber of `topic`.
    ///
    /// Returns the number of subscribers that received the event. Closed
    /// subscribers are removed; their failure never reaches the publisher.
    pub fn publish(&self, topic: &str, event: ChatEvent) -> usize {
        let mut topics = self.topics.lock().expect("channel lock poisoned");
        let Some(subscribers) = topics.get_mut(topic) else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|_, tx| match tx.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            // Receiver dropped without deregistering (e.g. aborted task).
            Err(_) => false,
        });

        if subscribers.is_empty() {
            topics.remove(topic);
        }
        delivered
    }

    /// Register a new listener on `topic`.
    ///
    /// The returned guard yields events via [`Subscription::recv`] and
    /// deregisters itself when dropped.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut topics = self.topics.lock().expect("channel lock poisoned");
        topics.entry(topic.to_string()).or_default().insert(id, tx);

        Subscription {
            topic: topic.to_string(),
            id,
            receiver: rx,
            topics: Arc::clone(&self.topics),
        }
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .expect("channel lock poisoned")
            .get(topic)
            .map_or(0, |s| s.len())
    }
}

/// A scoped subscription to one chat's events.
pub struct Subscription {
    topic: Topic,
    id: Uuid,
    receiver: mpsc::UnboundedReceiver<ChatEvent>,
    topics: Arc<Mutex<HashMap<Topic, Subscribers>>>,
}

impl Subscription {
    /// Receive the next event, or `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        self.receiver.recv().await
    }

    /// Receive without waiting. `None` when no event is queued.
    pub fn try_recv(&mut self) -> Option<ChatEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut topics = self.topics.lock().expect("channel lock poisoned");
        if let Some(subscribers) = topics.get_mut(&self.topic) {
            subscribers.remove(&self.id);
            if subscribers.is_empty() {
                topics.remove(&self.topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventField;
    use crate::message::Role;

    fn chunk(text: &str) -> ChatEvent {
        ChatEvent::AddChunk {
            field: EventField::Content,
            chunk: text.into(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let channel = ChatChannel::new();
        let mut sub = channel.subscribe("chat-1");

        let delivered = channel.publish("chat-1", chunk("hello"));
        assert_eq!(delivered, 1);

        match sub.recv().await.unwrap() {
            ChatEvent::AddChunk { chunk, .. } => assert_eq!(chunk, "hello"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_lossy() {
        let channel = ChatChannel::new();
        assert_eq!(channel.publish("nobody-home", chunk("lost")), 0);
    }

    #[tokio::test]
    async fn events_are_scoped_to_topic() {
        let channel = ChatChannel::new();
        let mut sub_a = channel.subscribe("chat-a");
        let _sub_b = channel.subscribe("chat-b");

        channel.publish("chat-a", chunk("for a"));
        channel.publish("chat-b", chunk("for b"));

        match sub_a.recv().await.unwrap() {
            ChatEvent::AddChunk { chunk, .. } => assert_eq!(chunk, "for a"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(sub_a.try_recv().is_none());
    }

    #[tokio::test]
    async fn subscriber_receives_in_publish_order() {
        let channel = ChatChannel::new();
        let mut sub = channel.subscribe("chat-1");

        channel.publish(
            "chat-1",
            ChatEvent::BeginMessage {
                id: "m1".into(),
                role: Role::Assistant,
                name: None,
            },
        );
        channel.publish("chat-1", chunk("a"));
        channel.publish("chat-1", chunk("b"));
        channel.publish("chat-1", ChatEvent::EndMessage);

        assert!(matches!(
            sub.recv().await.unwrap(),
            ChatEvent::BeginMessage { .. }
        ));
        for expected in ["a", "b"] {
            match sub.recv().await.unwrap() {
                ChatEvent::AddChunk { chunk, .. } => assert_eq!(chunk, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(matches!(sub.recv().await.unwrap(), ChatEvent::EndMessage));
    }

    #[test]
    fn drop_deregisters_subscriber() {
        let channel = ChatChannel::new();
        let sub = channel.subscribe("chat-1");
        assert_eq!(channel.subscriber_count("chat-1"), 1);

        drop(sub);
        assert_eq!(channel.subscriber_count("chat-1"), 0);
        assert_eq!(channel.publish("chat-1", chunk("x")), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_publisher() {
        let channel = ChatChannel::new();
        // Never read from this subscription.
        let _sub = channel.subscribe("chat-1");

        // A burst of publishes must complete immediately.
        for i in 0..1000 {
            channel.publish("chat-1", chunk(&i.to_string()));
        }
        assert_eq!(channel.subscriber_count("chat-1"), 1);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_every_event() {
        let channel = ChatChannel::new();
        let mut sub1 = channel.subscribe("chat-1");
        let mut sub2 = channel.subscribe("chat-1");

        assert_eq!(channel.publish("chat-1", chunk("x")), 2);

        for sub in [&mut sub1, &mut sub2] {
            match sub.recv().await.unwrap() {
                ChatEvent::AddChunk { chunk, .. } => assert_eq!(chunk, "x"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }
}
