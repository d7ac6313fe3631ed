//! Foreground/background handling of the content surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use tether_core::host::{ConnectivityMonitor, ShellSurface};
use tether_core::AppLifecycleState;
use tether_settings::LifecycleSettings;

use crate::cleanup::{self, PurgeReport};
use crate::location::LocationCoordinator;

/// What a lifecycle change did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Back in the foreground: transient storage purged, surface recreated.
    Foreground(PurgeReport),
    /// Back in the foreground during camera activity; nothing reloaded.
    ForegroundSuppressed,
    /// Left the foreground: tracking and connectivity monitoring stopped.
    Background,
}

pub struct LifecycleCoordinator {
    shell: Arc<dyn ShellSurface>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    roots: Vec<PathBuf>,
    grace: Duration,
    state: AppLifecycleState,
    reloading: bool,
    surface_ready: bool,
    monitoring: bool,
    camera_open: bool,
    camera_closed_at: Option<Instant>,
}

impl LifecycleCoordinator {
    pub fn new(
        shell: Arc<dyn ShellSurface>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        settings: &LifecycleSettings,
    ) -> Self {
        Self {
            shell,
            connectivity,
            roots: vec![settings.temp_dir.clone(), settings.cache_dir.clone()],
            grace: Duration::from_millis(settings.camera_grace_ms),
            state: AppLifecycleState::Active,
            reloading: false,
            surface_ready: false,
            monitoring: false,
            camera_open: false,
            camera_closed_at: None,
        }
    }

    pub fn state(&self) -> AppLifecycleState {
        self.state
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    /// Whether the surface has finished loading and can take native events.
    pub fn surface_ready(&self) -> bool {
        self.surface_ready
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    pub fn camera_open(&self) -> bool {
        self.camera_open
    }

    pub fn camera_opened(&mut self) {
        self.camera_open = true;
        self.camera_closed_at = None;
    }

    pub fn camera_closed(&mut self) {
        if self.camera_open {
            self.camera_open = false;
            self.camera_closed_at = Some(Instant::now());
        }
    }

    /// Reloads are held off while the camera is open and for the grace
    /// window after it closes.
    pub fn camera_suppressing(&self) -> bool {
        self.camera_open
            || self
                .camera_closed_at
                .is_some_and(|closed| closed.elapsed() < self.grace)
    }

    pub async fn on_state_change(
        &mut self,
        next: AppLifecycleState,
        location: &mut LocationCoordinator,
    ) -> Transition {
        let prev = self.state;
        self.state = next;
        debug!(from = ?prev, to = ?next, "lifecycle");

        if next.is_away() {
            location.stop().await;
            self.stop_connectivity();
            return Transition::Background;
        }

        if prev.is_away() {
            if self.camera_suppressing() {
                info!("foreground re-entry during camera activity, reload skipped");
                return Transition::ForegroundSuppressed;
            }
            return Transition::Foreground(self.refresh_surface().await);
        }

        Transition::None
    }

    /// The surface finished loading.
    pub fn on_surface_loaded(&mut self) {
        self.reloading = false;
        self.surface_ready = true;
        self.shell.set_loading(false);
        self.start_connectivity();
        info!("surface ready");
    }

    async fn refresh_surface(&mut self) -> PurgeReport {
        self.reloading = true;
        self.surface_ready = false;
        self.start_connectivity();
        self.shell.set_loading(true);

        let report = cleanup::purge_roots(&self.roots).await;
        info!(removed = report.removed, failed = report.failed.len(), "transient storage purged");

        self.shell.reload();
        self.shell.set_camera_visible(false);
        self.camera_open = false;
        self.camera_closed_at = None;
        report
    }

    fn start_connectivity(&mut self) {
        if self.monitoring {
            return;
        }
        match self.connectivity.start_monitoring() {
            Ok(()) => self.monitoring = true,
            Err(e) => warn!(error = %e, "failed to start connectivity monitoring"),
        }
    }

    fn stop_connectivity(&mut self) {
        if !self.monitoring {
            return;
        }
        if let Err(e) = self.connectivity.stop_monitoring() {
            warn!(error = %e, "failed to stop connectivity monitoring");
        }
        self.monitoring = false;
    }
}
