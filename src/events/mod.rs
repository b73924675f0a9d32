use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted by the services. Delivery is best effort: a failed
/// send is logged by the caller and never fails the originating request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),
    OrderCompleted(Uuid),
    OrderDeleted(Uuid),

    // Settlement events
    SaleCreated {
        sale_id: Uuid,
        order_id: Uuid,
    },
    PaymentRecorded {
        payment_id: Uuid,
        sale_id: Uuid,
        amount: Decimal,
    },
    PaymentRefunded {
        payment_id: Uuid,
        sale_id: Uuid,
        amount: Decimal,
    },

    // Cashier events
    SessionOpened {
        session_id: Uuid,
        user_id: Uuid,
    },
    SessionClosed {
        session_id: Uuid,
        difference: Decimal,
    },
    CashMovementRecorded {
        session_id: Uuid,
        movement_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, logging each event. Runs until all senders drop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "Processing event");
    }

    info!("Event channel closed; event processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        sender
            .send(Event::OrderCreated(Uuid::new_v4()))
            .await
            .expect("send should succeed");

        assert!(matches!(rx.recv().await, Some(Event::OrderCreated(_))));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::OrderDeleted(Uuid::new_v4())).await;
        assert!(result.is_err());
    }
}
