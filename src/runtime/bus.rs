use crate::types::TerminalEvent;

pub type SubscriptionId = u64;

type Subscriber = Box<dyn FnMut(&TerminalEvent)>;

/// Synchronous, ordered multicast of terminal events.
///
/// Subscribers run inline, in subscription order, and only ever see a shared
/// reference to the event. They have no handle on the bus, so an event can
/// never be published from inside another event's delivery.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: SubscriptionId,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn FnMut(&TerminalEvent)>) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(candidate, _)| *candidate != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: &TerminalEvent) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
