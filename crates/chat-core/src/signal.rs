use std::collections::HashSet;

use chat_protocol::ChatEvent;
use tokio::sync::broadcast;

/// Broadcast stream of timeline signals.
pub type SignalStream = broadcast::Receiver<TimelineSignal>;

/// Notifications emitted by a timeline store to its UI consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineSignal {
    /// Channels were rebuilt after a load; carries the jump target event id
    /// when the load was an event-timeline jump.
    Ready {
        /// Jump target, `None` after a live-timeline load.
        event_id: Option<String>,
    },
    /// A pagination request finished.
    Paginated {
        /// Direction of the request.
        backwards: bool,
        /// Net growth of the main timeline; zero on boundary or failure.
        loaded: usize,
    },
    /// A live event was folded into the store.
    Event(ChatEvent),
    /// An event was redacted.
    EventRedacted(ChatEvent),
    /// The typing-member set changed; carries a snapshot copy.
    TypingMembersUpdated(HashSet<String>),
    /// The latest live event gained a read receipt.
    LiveReceipt,
}

/// Per-store signal fan-out.
///
/// Each timeline store owns one hub; subscriptions are independent broadcast
/// receivers that can be dropped to unsubscribe, so no global emitter state
/// survives a room switch.
#[derive(Clone, Debug)]
pub struct SignalHub {
    tx: broadcast::Sender<TimelineSignal>,
}

impl SignalHub {
    /// Create a hub with the given buffer capacity.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Subscribe to emitted signals.
    pub fn subscribe(&self) -> SignalStream {
        self.tx.subscribe()
    }

    /// Emit a signal to all subscribers.
    ///
    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub fn emit(&self, signal: TimelineSignal) {
        let _ = self.tx.send(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fans_out_signals_to_all_subscribers() {
        let hub = SignalHub::new(16);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.emit(TimelineSignal::LiveReceipt);

        assert_eq!(a.recv().await.expect("a"), TimelineSignal::LiveReceipt);
        assert_eq!(b.recv().await.expect("b"), TimelineSignal::LiveReceipt);
    }

    #[tokio::test]
    async fn dropped_subscription_does_not_block_emission() {
        let hub = SignalHub::new(4);
        let sub = hub.subscribe();
        drop(sub);

        hub.emit(TimelineSignal::Ready { event_id: None });

        let mut late = hub.subscribe();
        hub.emit(TimelineSignal::LiveReceipt);
        assert_eq!(late.recv().await.expect("late"), TimelineSignal::LiveReceipt);
    }
}
