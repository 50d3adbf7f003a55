/// Event bus for sound notifications
///
/// Anything holding a clone of the bus can subscribe; every sound publishes
/// its load and instance lifecycle events here. A subscriber can listen to
/// everything or to a single alias.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;

use super::events::SoundEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    /// Only forward events about this alias
    alias: Option<String>,
    sender: Sender<SoundEvent>,
}

impl Subscriber {
    fn wants(&self, event: &SoundEvent) -> bool {
        match &self.alias {
            None => true,
            Some(alias) => event.alias() == Some(alias.as_str()),
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<AtomicUsize>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event
    pub fn subscribe(&self) -> (Receiver<SoundEvent>, SubscriberId) {
        self.add_subscriber(None)
    }

    /// Receive only events about `alias`
    pub fn subscribe_alias(&self, alias: impl Into<String>) -> (Receiver<SoundEvent>, SubscriberId) {
        self.add_subscriber(Some(alias.into()))
    }

    fn add_subscriber(&self, alias: Option<String>) -> (Receiver<SoundEvent>, SubscriberId) {
        let (sender, rx) = unbounded();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber { id, alias, sender });
        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    /// Deliver `event` to every interested subscriber, dropping those whose
    /// receiver is gone
    pub fn publish(&self, event: SoundEvent) {
        let mut closed = Vec::new();
        for subscriber in self.subscribers.read().iter() {
            if subscriber.wants(&event) && subscriber.sender.try_send(event.clone()).is_err() {
                closed.push(subscriber.id);
            }
        }
        if !closed.is_empty() {
            tracing::debug!("Removing {} closed event subscriber(s)", closed.len());
            self.subscribers.write().retain(|s| !closed.contains(&s.id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}
