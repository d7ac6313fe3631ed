use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{info, warn};

use tether_core::host::{ConnectivityMonitor, ShellSurface};
use tether_core::HostError;

/// Headless container: no real view hierarchy, so view changes are logged
/// and counted. URLs go to the desktop's default handler.
#[derive(Default)]
pub struct DesktopShell {
    reloads: AtomicU64,
    loading: AtomicBool,
    camera_visible: AtomicBool,
    monitoring: AtomicBool,
}

impl DesktopShell {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl DesktopShell {
    fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    fn is_camera_visible(&self) -> bool {
        self.camera_visible.load(Ordering::Relaxed)
    }

    fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Relaxed)
    }
}

impl ShellSurface for DesktopShell {
    fn reload(&self) {
        let n = self.reloads.fetch_add(1, Ordering::Relaxed) + 1;
        info!(generation = n, "content surface recreated");
    }

    fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::Relaxed);
        info!(loading, "loading screen");
    }

    fn set_camera_visible(&self, visible: bool) {
        self.camera_visible.store(visible, Ordering::Relaxed);
        info!(visible, "camera view");
    }

    fn open_url(&self, url: &str) -> Result<(), HostError> {
        open::that_detached(url).map_err(|e| {
            warn!(url, error = %e, "failed to open url");
            HostError::Rejected(format!("open {url}: {e}"))
        })
    }
}

impl ConnectivityMonitor for DesktopShell {
    fn start_monitoring(&self) -> Result<(), HostError> {
        if !self.monitoring.swap(true, Ordering::Relaxed) {
            info!("connectivity monitoring started");
        }
        Ok(())
    }

    fn stop_monitoring(&self) -> Result<(), HostError> {
        if self.monitoring.swap(false, Ordering::Relaxed) {
            info!("connectivity monitoring stopped");
        }
        Ok(())
    }
}
