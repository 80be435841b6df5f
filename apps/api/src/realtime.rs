#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Entity families a consumer can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Submission,
    Subscription,
    FeedbackItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// One change notification. Carries only identity, not payload: consumers
/// refetch the affected view, and a missed event is recovered by the next
/// refetch-on-navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub resource: ResourceKind,
    pub scope_id: Uuid,
    pub entity_id: Uuid,
    pub change: ChangeKind,
}

const CHANNEL_CAPACITY: usize = 64;

type ScopeKey = (ResourceKind, Uuid);

/// Fan-out hub for change notifications, keyed by (resource kind, scope id).
/// Publishing is fire-and-forget; a scope with no subscribers drops the
/// event on the floor.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    channels: Arc<Mutex<HashMap<ScopeKey, broadcast::Sender<ChangeEvent>>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to changes for one scope. The returned handle unsubscribes
    /// on drop; consumers must drop it on teardown to avoid leaks.
    pub fn subscribe(&self, resource: ResourceKind, scope_id: Uuid) -> RealtimeSubscription {
        let mut channels = self.channels.lock().unwrap();
        let sender = channels
            .entry((resource, scope_id))
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        RealtimeSubscription {
            receiver: Some(sender.subscribe()),
            hub: self.clone(),
            key: (resource, scope_id),
        }
    }

    /// Publishes a change to whoever is listening on its scope.
    pub fn publish(&self, event: ChangeEvent) {
        let channels = self.channels.lock().unwrap();
        if let Some(sender) = channels.get(&(event.resource, event.scope_id)) {
            // A send error only means no live receivers.
            let _ = sender.send(event);
        }
    }

    /// Drops the channel for a scope once its last subscriber is gone.
    fn prune(&self, key: ScopeKey) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(sender) = channels.get(&key) {
            if sender.receiver_count() == 0 {
                channels.remove(&key);
            }
        }
    }

    #[cfg(test)]
    pub fn scope_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

/// Cancellation handle for one (resource, scope) subscription.
/// The receiver lives in an `Option` so drop can release it before asking
/// the hub to prune; otherwise this handle still counts as a subscriber
/// and the scope entry would never go away.
pub struct RealtimeSubscription {
    receiver: Option<broadcast::Receiver<ChangeEvent>>,
    hub: RealtimeHub,
    key: ScopeKey,
}

impl RealtimeSubscription {
    /// Next change event, or `None` once the scope's channel closed or this
    /// receiver lagged past the buffer (callers then fall back to refetch).
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        match self.receiver.as_mut()?.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Realtime subscriber lagged, skipped {skipped} events");
                None
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        // Release the receiver first so the hub's receiver count no longer
        // includes this handle when it decides whether to prune.
        self.receiver.take();
        self.hub.prune(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(scope_id: Uuid, entity_id: Uuid) -> ChangeEvent {
        ChangeEvent {
            resource: ResourceKind::Submission,
            scope_id,
            entity_id,
            change: ChangeKind::Updated,
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_scoped_event() {
        let hub = RealtimeHub::new();
        let scope = Uuid::new_v4();
        let entity = Uuid::new_v4();

        let mut sub = hub.subscribe(ResourceKind::Submission, scope);
        hub.publish(event(scope, entity));

        let received = sub.next().await.expect("event expected");
        assert_eq!(received.entity_id, entity);
        assert_eq!(received.change, ChangeKind::Updated);
    }

    #[tokio::test]
    async fn test_other_scope_does_not_leak() {
        let hub = RealtimeHub::new();
        let scope_a = Uuid::new_v4();
        let scope_b = Uuid::new_v4();

        let mut sub = hub.subscribe(ResourceKind::Submission, scope_a);
        hub.publish(event(scope_b, Uuid::new_v4()));
        hub.publish(event(scope_a, Uuid::new_v4()));

        let received = sub.next().await.expect("event expected");
        assert_eq!(received.scope_id, scope_a);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let hub = RealtimeHub::new();
        hub.publish(event(Uuid::new_v4(), Uuid::new_v4()));
        assert_eq!(hub.scope_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes_and_prunes() {
        let hub = RealtimeHub::new();
        let scope = Uuid::new_v4();
        let sub = hub.subscribe(ResourceKind::Submission, scope);
        assert_eq!(hub.scope_count(), 1);
        drop(sub);
        assert_eq!(hub.scope_count(), 0);
    }

    #[tokio::test]
    async fn test_two_subscribers_same_scope() {
        let hub = RealtimeHub::new();
        let scope = Uuid::new_v4();
        let mut a = hub.subscribe(ResourceKind::Submission, scope);
        let mut b = hub.subscribe(ResourceKind::Submission, scope);

        hub.publish(event(scope, Uuid::new_v4()));
        assert!(a.next().await.is_some());
        assert!(b.next().await.is_some());

        drop(a);
        // One subscriber remains; the scope must survive.
        assert_eq!(hub.scope_count(), 1);
        drop(b);
        assert_eq!(hub.scope_count(), 0);
    }
}
