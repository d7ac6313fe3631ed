//! Routes decoded surface messages and native events to the coordinators.
//!
//! The dispatcher is the last line of defence: any handler error becomes a
//! `Message_Error` envelope and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use tether_core::host::ShellSurface;
use tether_core::protocol::DiagnosticLevel;
use tether_core::{
    decode, BridgeError, CameraEvent, DecodeError, HostInput, InboundMessage, NativeEvent,
    OutboundMessage, RawMessage,
};
use tether_settings::BridgeSettings;

use crate::capture::CapturePipeline;
use crate::event::{BridgeEvent, EventSink};
use crate::hosts::Hosts;
use crate::lifecycle::{LifecycleCoordinator, Transition};
use crate::location::{HistoryTarget, LocationCoordinator};
use crate::outbox::Outbox;

/// Whether the event loop keeps running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Dispatcher {
    installed_version: String,
    refresh_delay: Duration,
    outbox: Outbox,
    events: EventSink,
    shell: Arc<dyn ShellSurface>,
    location: LocationCoordinator,
    capture: CapturePipeline,
    lifecycle: LifecycleCoordinator,
}

impl Dispatcher {
    pub fn new(settings: &BridgeSettings, hosts: Hosts, outbox: Outbox, events: EventSink) -> Self {
        let history = match (&hosts.history, &settings.history) {
            (Some(sink), Some(h)) => Some(HistoryTarget::new(
                Arc::clone(sink),
                h.subject_id.clone(),
                h.group_key.clone(),
            )),
            _ => None,
        };
        let location = LocationCoordinator::new(
            hosts.location,
            outbox.clone(),
            events.clone(),
            &settings.location,
            history,
        );
        let capture = CapturePipeline::new(
            hosts.camera,
            hosts.resizer,
            outbox.clone(),
            settings.capture.clone(),
        );
        let lifecycle = LifecycleCoordinator::new(
            Arc::clone(&hosts.shell),
            hosts.connectivity,
            &settings.lifecycle,
        );
        Self {
            installed_version: settings.shell.installed_version.trim().to_owned(),
            refresh_delay: Duration::from_millis(settings.location.refresh_delay_ms),
            outbox,
            events,
            shell: hosts.shell,
            location,
            capture,
            lifecycle,
        }
    }

    pub fn location(&self) -> &LocationCoordinator {
        &self.location
    }

    pub fn capture(&self) -> &CapturePipeline {
        &self.capture
    }

    pub fn lifecycle(&self) -> &LifecycleCoordinator {
        &self.lifecycle
    }

    pub async fn handle_event(&mut self, event: BridgeEvent) -> Flow {
        match event {
            BridgeEvent::Input(input) => self.handle_input(input).await,
            BridgeEvent::Fix { generation, fix } => {
                self.location.on_fix(generation, fix).await;
                Flow::Continue
            }
            BridgeEvent::RestartTracking { generation } => {
                self.location.on_restart(generation).await;
                Flow::Continue
            }
            BridgeEvent::Captured(result) => {
                let outcome = self.capture.finish_capture(result).await;
                self.settle("capture", outcome.map(|()| Flow::Continue))
            }
        }
    }

    pub async fn handle_input(&mut self, input: HostInput) -> Flow {
        match input {
            HostInput::Surface(raw) => self.handle_surface(raw).await,
            HostInput::Native(event) => {
                let label = native_label(&event);
                let outcome = self.handle_native(event).await;
                self.settle(label, outcome)
            }
        }
    }

    /// Decode and route one message from the content surface.
    pub async fn handle_surface(&mut self, raw: RawMessage) -> Flow {
        let envelope = match decode(raw) {
            Ok(envelope) => envelope,
            Err(DecodeError::MissingType) => {
                debug!("ignoring message without a type");
                return Flow::Continue;
            }
            Err(e) => return self.settle("decode", Err(BridgeError::from(e))),
        };
        let message = InboundMessage::from_envelope(&envelope);
        let tag = message.tag().to_owned();
        debug!(tag = %tag, "inbound");
        let outcome = self.handle_message(message).await;
        self.settle(&tag, outcome)
    }

    fn settle(&self, context: &str, outcome: Result<Flow, BridgeError>) -> Flow {
        match outcome {
            Ok(flow) => flow,
            Err(e) => {
                warn!(context, error = %e, kind = e.error_kind(), "handler failed");
                let _ = self.outbox.send(OutboundMessage::MessageError);
                Flow::Continue
            }
        }
    }

    async fn handle_message(&mut self, message: InboundMessage) -> Result<Flow, BridgeError> {
        match message {
            InboundMessage::CheckVersion { required_version } => {
                let current = required_version.as_deref() == Some(self.installed_version.as_str());
                info!(
                    required = required_version.as_deref().unwrap_or(""),
                    installed = %self.installed_version,
                    current,
                    "version check"
                );
                let _ = self.outbox.send(if current {
                    OutboundMessage::VersionNotExpired
                } else {
                    OutboundMessage::VersionExpired
                });
            }
            InboundMessage::TrackLocation { accuracy } => {
                let threshold = accuracy.unwrap_or_else(|| self.location.default_threshold());
                self.location.track(threshold).await;
            }
            InboundMessage::StopTracking => self.location.untrack().await,
            InboundMessage::ResetAccuracy => self.location.set_threshold(0.0),
            InboundMessage::OpenCamera => self.open_camera().await,
            InboundMessage::GetLocation => self.location.request_refresh(self.refresh_delay).await,
            InboundMessage::GetCurrentLocation => {
                let once = self.location.get_once();
                let _ = tokio::spawn(async move {
                    if let Err(e) = once.await {
                        debug!(error = %e, kind = e.error_kind(), "one-shot fix failed");
                    }
                });
            }
            InboundMessage::OpenMap { url } => match url {
                Some(url) => {
                    info!(url = %url, "opening map");
                    self.shell.open_url(&url)?;
                }
                None => debug!("map request without url"),
            },
            InboundMessage::ExitApp => {
                info!("exit requested by surface");
                self.location.untrack().await;
                self.capture.cancel().await;
                return Ok(Flow::Exit);
            }
            InboundMessage::Diagnostic { level, msg } => {
                let msg = msg.unwrap_or_default();
                match level {
                    DiagnosticLevel::Error => warn!(target: "tether::surface", msg = %msg, "surface error"),
                    DiagnosticLevel::Info => info!(target: "tether::surface", msg = %msg, "surface info"),
                }
            }
            InboundMessage::Unknown(tag) => debug!(tag = %tag, "ignoring unknown message"),
        }
        Ok(Flow::Continue)
    }

    async fn open_camera(&mut self) {
        if !self.location.service_enabled().await {
            info!("camera refused, location service disabled");
            let _ = self.outbox.send(OutboundMessage::LocationDisabled);
            return;
        }
        if self.lifecycle.camera_open() {
            debug!("camera already open");
            return;
        }
        self.location.pause().await;
        self.lifecycle.camera_opened();
        self.shell.set_camera_visible(true);
        info!("camera opened");
    }

    /// Hide the camera and hand the location service back. A capture still
    /// in flight is dropped; its result is discarded when it lands.
    async fn close_camera(&mut self) {
        self.shell.set_camera_visible(false);
        self.lifecycle.camera_closed();
        self.capture.cancel().await;
        self.location.restore().await;
        info!("camera closed");
    }

    async fn handle_native(&mut self, event: NativeEvent) -> Result<Flow, BridgeError> {
        match event {
            NativeEvent::Connectivity { mobile_data_on } => {
                if self.lifecycle.surface_ready() {
                    let _ = self
                        .outbox
                        .send(OutboundMessage::ConnectivityStatus(mobile_data_on));
                } else {
                    debug!("surface not ready, connectivity status skipped");
                }
            }
            NativeEvent::LocationStatus { location_on } => {
                if self.lifecycle.surface_ready() {
                    let _ = self.outbox.send(OutboundMessage::LocationStatus(location_on));
                    self.location.on_location_status(location_on).await;
                } else {
                    debug!("surface not ready, location status skipped");
                }
            }
            NativeEvent::Lifecycle(state) => {
                let transition = self.lifecycle.on_state_change(state, &mut self.location).await;
                if matches!(transition, Transition::Foreground(_)) {
                    self.capture.cancel().await;
                }
            }
            NativeEvent::SurfaceLoaded => self.lifecycle.on_surface_loaded(),
            NativeEvent::BackPressed => {
                let _ = self.outbox.send(OutboundMessage::ExitRequest);
            }
            NativeEvent::Camera(CameraEvent::CaptureRequested) => {
                if !self.lifecycle.camera_open() || !self.capture.is_idle() {
                    debug!("shutter ignored");
                    return Ok(Flow::Continue);
                }
                let job = self.capture.start_capture();
                let events = self.events.clone();
                let _ = tokio::spawn(async move {
                    let result = job.run().await;
                    if !events.post(BridgeEvent::Captured(result)).await {
                        error!("capture finished after shutdown");
                    }
                });
            }
            NativeEvent::Camera(CameraEvent::Confirmed) => {
                let _ = self.capture.confirm().await;
                self.close_camera().await;
            }
            NativeEvent::Camera(CameraEvent::Cancelled) => self.close_camera().await,
        }
        Ok(Flow::Continue)
    }
}

fn native_label(event: &NativeEvent) -> &'static str {
    match event {
        NativeEvent::Connectivity { .. } => "connectivity",
        NativeEvent::LocationStatus { .. } => "location_status",
        NativeEvent::Lifecycle(_) => "lifecycle",
        NativeEvent::SurfaceLoaded => "surface_loaded",
        NativeEvent::BackPressed => "back",
        NativeEvent::Camera(_) => "camera",
    }
}
