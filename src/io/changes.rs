use std::sync::mpsc;

use crate::io::store::ScopeId;
use crate::model::group::{GroupKey, RecordKind};

/// Sent to subscribers after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The scope the commit originated from
    pub scope: ScopeId,
    /// Ordering domains whose records changed, limited to the subscriber's interest
    pub groups: Vec<GroupKey>,
}

/// Which commits a subscriber wants to hear about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    Everything,
    Group(GroupKey),
    Kind(RecordKind),
}

impl Interest {
    pub fn matches(&self, group: &GroupKey) -> bool {
        match self {
            Interest::Everything => true,
            Interest::Group(g) => g == group,
            Interest::Kind(kind) => group.kind() == *kind,
        }
    }
}

/// Receiving end handed to an observer.
pub struct Subscription {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Non-blocking poll for pending change events.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

/// Per-store fan-out of commit notifications.
///
/// Each subscriber only receives events that touch a group it cares about,
/// and only the matching groups are included in its payload.
#[derive(Default)]
pub struct ChangeBus {
    subscribers: Vec<(Interest, mpsc::Sender<ChangeEvent>)>,
}

impl ChangeBus {
    pub fn subscribe(&mut self, interest: Interest) -> Subscription {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push((interest, tx));
        Subscription { rx }
    }

    /// Deliver `event` to every interested subscriber.
    /// Subscribers whose receiver was dropped are forgotten.
    /// Returns how many subscribers were notified.
    pub fn publish(&mut self, event: &ChangeEvent) -> usize {
        let mut delivered = 0;
        self.subscribers.retain(|(interest, tx)| {
            let groups: Vec<GroupKey> = event
                .groups
                .iter()
                .filter(|g| interest.matches(g))
                .copied()
                .collect();
            if groups.is_empty() {
                return true;
            }
            let sent = tx
                .send(ChangeEvent {
                    scope: event.scope,
                    groups,
                })
                .is_ok();
            if sent {
                delivered += 1;
            }
            sent
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
