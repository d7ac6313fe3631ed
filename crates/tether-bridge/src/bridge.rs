use tokio::sync::mpsc;
use tracing::info;

use tether_core::{HostInput, NativeEvent, RawMessage};
use tether_settings::BridgeSettings;

use crate::dispatcher::{Dispatcher, Flow};
use crate::event::{BridgeEvent, EventSink};
use crate::hosts::Hosts;
use crate::outbox::Outbox;

const EVENT_QUEUE: usize = 256;

/// Why [`Bridge::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// The surface sent `Exit_App`.
    ExitRequested,
    /// Every [`BridgeHandle`] was dropped.
    Closed,
}

/// Sending half used by the host to feed the bridge.
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    tx: mpsc::Sender<BridgeEvent>,
}

impl BridgeHandle {
    /// Returns false once the bridge has stopped.
    pub async fn send(&self, input: HostInput) -> bool {
        self.tx.send(BridgeEvent::Input(input)).await.is_ok()
    }

    pub async fn surface(&self, raw: impl Into<RawMessage>) -> bool {
        self.send(HostInput::Surface(raw.into())).await
    }

    pub async fn native(&self, event: NativeEvent) -> bool {
        self.send(HostInput::Native(event)).await
    }
}

/// One bridge session: a single event loop that owns all coordinator
/// state, so handlers never race each other.
pub struct Bridge {
    dispatcher: Dispatcher,
    events: mpsc::Receiver<BridgeEvent>,
}

impl Bridge {
    /// Build a bridge. Returns it with the handle that feeds it and the
    /// stream of wire messages for the content surface.
    pub fn new(settings: &BridgeSettings, hosts: Hosts) -> (Self, BridgeHandle, mpsc::Receiver<String>) {
        let (tx, events) = mpsc::channel(EVENT_QUEUE);
        let (outbox, surface) = Outbox::channel(settings.shell.outbound_queue);
        let dispatcher = Dispatcher::new(settings, hosts, outbox, EventSink::new(&tx));
        (Self { dispatcher, events }, BridgeHandle { tx }, surface)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Process one event, waiting for it if necessary. Returns the reason
    /// once the bridge should stop.
    pub async fn step(&mut self) -> Option<Shutdown> {
        match self.events.recv().await {
            Some(event) => match self.dispatcher.handle_event(event).await {
                Flow::Continue => None,
                Flow::Exit => Some(Shutdown::ExitRequested),
            },
            None => Some(Shutdown::Closed),
        }
    }

    pub async fn run(mut self) -> Shutdown {
        info!("bridge running");
        loop {
            if let Some(reason) = self.step().await {
                info!(?reason, "bridge stopped");
                return reason;
            }
        }
    }
}
