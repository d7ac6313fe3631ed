use tokio::sync::mpsc;
use tracing::{debug, warn};

use tether_core::OutboundMessage;

/// Single serialization point for everything posted to the content surface.
///
/// Messages are encoded here and queued in completion order. A full queue
/// drops the message rather than stalling the event loop.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::Sender<String>,
}

impl Outbox {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a message. Returns false if it was dropped.
    pub fn send(&self, message: OutboundMessage) -> bool {
        let label = message.label();
        match self.tx.try_send(message.to_wire()) {
            Ok(()) => {
                debug!(message = label, "outbound");
                true
            }
            Err(mpsc::error::TrySendError::Full(wire)) => {
                warn!(message = label, len = wire.len(), "outbound queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(message = label, "surface gone, dropping message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_in_order() {
        let (outbox, mut rx) = Outbox::channel(4);
        assert!(outbox.send(OutboundMessage::LocationOff));
        assert!(outbox.send(OutboundMessage::ExitRequest));
        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"Location_off"}"#);
        assert_eq!(rx.recv().await.unwrap(), r#"{"type":"EXIT_REQUEST"}"#);
    }

    #[test]
    fn full_queue_drops() {
        let (outbox, _rx) = Outbox::channel(1);
        assert!(outbox.send(OutboundMessage::PositionError));
        assert!(!outbox.send(OutboundMessage::PositionError));
    }

    #[test]
    fn closed_queue_drops() {
        let (outbox, rx) = Outbox::channel(1);
        drop(rx);
        assert!(!outbox.send(OutboundMessage::MessageError));
    }
}
