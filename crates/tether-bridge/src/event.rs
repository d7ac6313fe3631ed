use tokio::sync::mpsc;
use tracing::debug;

use tether_core::{BridgeError, Fix, HostInput};

use crate::capture::CaptureSession;

/// Everything the bridge event loop reacts to: outside input plus the
/// completions of work it spawned itself.
#[derive(Debug)]
pub enum BridgeEvent {
    Input(HostInput),
    /// A periodic fix, tagged with the tracking generation of its watch.
    Fix { generation: u64, fix: Fix },
    /// The delayed restart scheduled by `Get_Location`.
    RestartTracking { generation: u64 },
    /// A capture job finished.
    Captured(Result<CaptureSession, BridgeError>),
}

/// Weak handle spawned tasks use to post back into the loop. Holding it
/// does not keep the loop alive.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::WeakSender<BridgeEvent>,
}

impl EventSink {
    pub fn new(tx: &mpsc::Sender<BridgeEvent>) -> Self {
        Self { tx: tx.downgrade() }
    }

    /// Post an event. Returns false once the loop has shut down.
    pub async fn post(&self, event: BridgeEvent) -> bool {
        let Some(tx) = self.tx.upgrade() else {
            debug!("event loop gone, dropping event");
            return false;
        };
        tx.send(event).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn post_reaches_loop() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(&tx);
        assert!(sink.post(BridgeEvent::RestartTracking { generation: 3 }).await);
        assert!(matches!(
            rx.recv().await,
            Some(BridgeEvent::RestartTracking { generation: 3 })
        ));
    }

    #[tokio::test]
    async fn sink_does_not_keep_loop_alive() {
        let (tx, mut rx) = mpsc::channel::<BridgeEvent>(4);
        let sink = EventSink::new(&tx);
        drop(tx);
        assert!(rx.recv().await.is_none());
        assert!(!sink.post(BridgeEvent::RestartTracking { generation: 1 }).await);
    }
}
