use std::sync::Arc;

use tokio::sync::broadcast;

use couple_types::events::GatewayEvent;

/// Fans gateway events out to all connected clients. Each connection task
/// filters by its subscribed conversation, so the dispatcher itself stays
/// oblivious to membership.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver; delivery
    /// per receiver preserves send order, and a lagged receiver skips ahead
    /// (consumers key messages by id, so a gap is recoverable by refetch).
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_receive_events_in_send_order() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        for id in [first, second] {
            dispatcher.broadcast(GatewayEvent::PartnerJoined {
                conversation_id: id,
                user_id: Uuid::new_v4(),
                display_name: "Sam".into(),
            });
        }

        for expected in [first, second] {
            match rx.recv().await.unwrap() {
                GatewayEvent::PartnerJoined { conversation_id, .. } => {
                    assert_eq!(conversation_id, expected)
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_a_no_op() {
        let dispatcher = Dispatcher::new();
        dispatcher.broadcast(GatewayEvent::PartnerJoined {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            display_name: "Sam".into(),
        });
    }
}
