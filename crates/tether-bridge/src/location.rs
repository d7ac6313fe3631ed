//! Location tracking coordinator.
//!
//! Owns at most one host watch. Every start, stop and pause bumps a
//! generation counter; fixes and delayed restarts carry the generation they
//! were issued under and are ignored once it is no longer current, since
//! host watch cancellation is not instantaneous.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tether_core::host::{LocationHistory, LocationProvider};
use tether_core::{BridgeError, Fix, FixRequest, OutboundMessage, WatchId, WatchPolicy};
use tether_settings::LocationSettings;

use crate::event::{BridgeEvent, EventSink};
use crate::outbox::Outbox;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackingMode {
    Idle,
    Watching,
    /// Watch released for a capability conflict; `resume` restarts it.
    Paused,
}

/// Where forwarded fixes are persisted.
#[derive(Clone)]
pub struct HistoryTarget {
    sink: Arc<dyn LocationHistory>,
    subject_id: String,
    group_key: String,
}

impl HistoryTarget {
    pub fn new(
        sink: Arc<dyn LocationHistory>,
        subject_id: impl Into<String>,
        group_key: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            subject_id: subject_id.into(),
            group_key: group_key.into(),
        }
    }

    /// Write a fix, or the empty "no fix" record. Failures are logged only.
    async fn record(&self, fix: Option<&Fix>) {
        let (lat, lng) = match fix {
            Some(f) => (f.latitude.to_string(), f.longitude.to_string()),
            None => (String::new(), String::new()),
        };
        if let Err(e) = self
            .sink
            .record(&self.subject_id, &self.group_key, &lat, &lng)
            .await
        {
            warn!(error = %e, subject = %self.subject_id, "location history write failed");
        }
    }
}

struct ActiveWatch {
    id: WatchId,
    forwarder: JoinHandle<()>,
}

pub struct LocationCoordinator {
    provider: Arc<dyn LocationProvider>,
    outbox: Outbox,
    events: EventSink,
    history: Option<HistoryTarget>,
    policy: WatchPolicy,
    fix_request: FixRequest,
    default_threshold: f64,
    threshold: f64,
    mode: TrackingMode,
    watch: Option<ActiveWatch>,
    generation: u64,
    /// The surface asked for tracking and has not withdrawn the request.
    tracking_requested: bool,
}

impl LocationCoordinator {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        outbox: Outbox,
        events: EventSink,
        settings: &LocationSettings,
        history: Option<HistoryTarget>,
    ) -> Self {
        Self {
            provider,
            outbox,
            events,
            history,
            policy: WatchPolicy {
                high_accuracy: settings.high_accuracy,
                distance_filter: settings.min_displacement_m,
                interval: Duration::from_millis(settings.interval_ms),
                fastest_interval: Duration::from_millis(settings.fastest_interval_ms),
                maximum_age: Duration::ZERO,
            },
            fix_request: FixRequest {
                high_accuracy: settings.high_accuracy,
                timeout: Duration::from_millis(settings.fix_timeout_ms),
                maximum_age: Duration::ZERO,
            },
            default_threshold: settings.default_accuracy_m,
            threshold: settings.default_accuracy_m,
            mode: TrackingMode::Idle,
            watch: None,
            generation: 0,
            tracking_requested: false,
        }
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn default_threshold(&self) -> f64 {
        self.default_threshold
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn watch_id(&self) -> Option<WatchId> {
        self.watch.as_ref().map(|w| w.id)
    }

    pub fn tracking_requested(&self) -> bool {
        self.tracking_requested
    }

    /// Whether the host location service is on. Lookup failures count as off.
    pub async fn service_enabled(&self) -> bool {
        self.provider.is_enabled().await.unwrap_or_else(|e| {
            warn!(error = %e, "location service state unknown");
            false
        })
    }

    /// The live gate, read on every fix.
    pub fn set_threshold(&mut self, threshold: f64) {
        debug!(from = self.threshold, to = threshold, "accuracy threshold");
        self.threshold = threshold;
    }

    /// Whether a fix passes the current accuracy gate. A zero threshold
    /// accepts any fix that reports an accuracy.
    pub fn accepts(&self, fix: &Fix) -> bool {
        match fix.accuracy {
            Some(accuracy) => self.threshold <= 0.0 || accuracy <= self.threshold,
            None => false,
        }
    }

    /// Surface-initiated tracking: record the request and (re)start.
    pub async fn track(&mut self, threshold: f64) {
        self.tracking_requested = true;
        self.stop().await;
        self.start(threshold).await;
    }

    /// Surface-initiated stop: withdraw the request and stop.
    pub async fn untrack(&mut self) {
        self.tracking_requested = false;
        self.stop().await;
    }

    /// Start watching with the given threshold, replacing any live watch.
    /// Never fails; a disabled service is reported to the surface and a
    /// failed registration leaves the coordinator idle.
    pub async fn start(&mut self, threshold: f64) {
        self.threshold = threshold;

        if !self.service_enabled().await {
            info!("location service disabled, not tracking");
            let _ = self.outbox.send(OutboundMessage::LocationDisabled);
            if self.watch.is_none() {
                self.mode = TrackingMode::Idle;
            }
            return;
        }

        self.release().await;
        self.generation += 1;

        match self.provider.watch(&self.policy).await {
            Ok(watch) => {
                let forwarder = spawn_forwarder(watch.fixes, self.generation, self.events.clone());
                info!(
                    watch = %watch.id,
                    generation = self.generation,
                    threshold = self.threshold,
                    "tracking started"
                );
                self.watch = Some(ActiveWatch {
                    id: watch.id,
                    forwarder,
                });
                self.mode = TrackingMode::Watching;
            }
            Err(e) => {
                warn!(error = %e, "watch registration failed");
                self.mode = TrackingMode::Idle;
            }
        }
    }

    /// Release the watch if present. Idempotent and silent.
    pub async fn stop(&mut self) {
        self.generation += 1;
        if self.watch.is_some() {
            self.release().await;
            info!(generation = self.generation, "tracking stopped");
        }
        self.mode = TrackingMode::Idle;
    }

    /// Release the watch but remember to restart it. Only from `Watching`.
    pub async fn pause(&mut self) {
        if self.mode != TrackingMode::Watching {
            debug!(mode = ?self.mode, "nothing to pause");
            return;
        }
        self.release().await;
        self.generation += 1;
        self.mode = TrackingMode::Paused;
        info!("tracking paused");
    }

    /// Restart a paused watch. Only from `Paused`.
    pub async fn resume(&mut self, threshold: f64) {
        if self.mode != TrackingMode::Paused {
            debug!(mode = ?self.mode, "nothing to resume");
            return;
        }
        info!("tracking resumed");
        self.start(threshold).await;
    }

    /// Bring tracking back after a capability conflict ends: resume a
    /// paused watch, or restart one the surface still wants but lost
    /// meanwhile (the app went to the background, say).
    pub async fn restore(&mut self) {
        match self.mode {
            TrackingMode::Paused => self.resume(self.threshold).await,
            TrackingMode::Idle if self.tracking_requested => {
                info!("restarting requested tracking");
                self.start(self.threshold).await;
            }
            _ => debug!(mode = ?self.mode, "nothing to restore"),
        }
    }

    /// Stop now and restart after `delay`, unless something else starts or
    /// stops tracking in between.
    pub async fn request_refresh(&mut self, delay: Duration) {
        self.stop().await;
        let generation = self.generation;
        let events = self.events.clone();
        let _ = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.post(BridgeEvent::RestartTracking { generation }).await;
        });
        debug!(delay_ms = delay.as_millis() as u64, "refresh scheduled");
    }

    pub async fn on_restart(&mut self, generation: u64) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "superseded refresh skipped");
            return;
        }
        self.start(self.threshold).await;
    }

    /// Periodic fix from the watch registered under `generation`.
    pub async fn on_fix(&mut self, generation: u64, fix: Fix) {
        if generation != self.generation || self.mode != TrackingMode::Watching {
            debug!(generation, current = self.generation, "stale fix ignored");
            return;
        }
        if !self.accepts(&fix) {
            debug!(accuracy = ?fix.accuracy, threshold = self.threshold, "fix dropped");
            return;
        }
        let _ = self
            .outbox
            .send(OutboundMessage::LocationUpdate(fix.lat_lng()));
        if let Some(history) = &self.history {
            history.record(Some(&fix)).await;
        }
    }

    /// Host reported the location switch. Turning it on restarts tracking
    /// the surface asked for; turning it off stops any tracking.
    pub async fn on_location_status(&mut self, location_on: bool) {
        if location_on {
            if self.tracking_requested && self.mode == TrackingMode::Idle {
                info!("location switched on, restarting requested tracking");
                self.start(self.threshold).await;
            }
        } else if self.mode != TrackingMode::Idle {
            info!("location switched off");
            self.stop().await;
        }
    }

    /// One-shot fix, detached from the coordinator so the caller can run it
    /// concurrently with the event loop. Posts `current_Location`,
    /// `Location_off` or `Position_error` before resolving.
    pub fn get_once(&self) -> impl Future<Output = Result<Fix, BridgeError>> + Send + 'static {
        let provider = Arc::clone(&self.provider);
        let outbox = self.outbox.clone();
        let history = self.history.clone();
        let request = self.fix_request.clone();

        async move {
            let outcome =
                tokio::time::timeout(request.timeout, provider.current_position(&request)).await;
            let result = match outcome {
                Ok(Ok(fix)) => {
                    let _ = outbox.send(OutboundMessage::CurrentLocation(fix.lat_lng()));
                    Ok(fix)
                }
                Ok(Err(e)) if e.code.is_service_disabled() => {
                    let _ = outbox.send(OutboundMessage::LocationOff);
                    Err(BridgeError::CapabilityDisabled(e.to_string()))
                }
                Ok(Err(e)) => {
                    let _ = outbox.send(OutboundMessage::PositionError);
                    Err(BridgeError::CapabilityFailure(e.to_string()))
                }
                Err(_) => {
                    let _ = outbox.send(OutboundMessage::PositionError);
                    Err(BridgeError::Timeout(request.timeout))
                }
            };
            if let Some(history) = &history {
                history.record(result.as_ref().ok()).await;
            }
            result
        }
    }

    async fn release(&mut self) {
        if let Some(active) = self.watch.take() {
            active.forwarder.abort();
            self.provider.clear_watch(active.id).await;
            debug!(watch = %active.id, "watch released");
        }
    }
}

fn spawn_forwarder(
    mut fixes: mpsc::Receiver<Fix>,
    generation: u64,
    events: EventSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(fix) = fixes.recv().await {
            if !events.post(BridgeEvent::Fix { generation, fix }).await {
                break;
            }
        }
    })
}
