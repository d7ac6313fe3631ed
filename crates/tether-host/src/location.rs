use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use tether_core::host::LocationProvider;
use tether_core::{Fix, FixError, FixErrorCode, FixRequest, HostError, PositionWatch, WatchId, WatchPolicy};

/// Location service that replays a fixed route, one fix per watch interval.
pub struct SimulatedLocation {
    enabled: AtomicBool,
    route: Vec<Fix>,
    cursor: AtomicUsize,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<WatchId, JoinHandle<()>>>,
}

impl SimulatedLocation {
    pub fn new(route: Vec<Fix>) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            route,
            cursor: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Flip the simulated location switch.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn next_fix(&self) -> Option<Fix> {
        if self.route.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(self.route[i % self.route.len()])
    }
}

#[cfg(test)]
impl SimulatedLocation {
    fn active_watches(&self) -> usize {
        self.tasks.lock().len()
    }
}

#[async_trait]
impl LocationProvider for SimulatedLocation {
    async fn is_enabled(&self) -> Result<bool, HostError> {
        Ok(self.enabled.load(Ordering::Relaxed))
    }

    async fn watch(&self, policy: &WatchPolicy) -> Result<PositionWatch, HostError> {
        if self.route.is_empty() {
            return Err(HostError::Unavailable("empty route".into()));
        }
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(16);
        let route = self.route.clone();
        let interval = policy.interval;

        let task = tokio::spawn(async move {
            for fix in route.iter().cycle() {
                if tx.send(*fix).await.is_err() {
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        });
        let _ = self.tasks.lock().insert(id, task);
        info!(watch = %id, interval_ms = interval.as_millis() as u64, "simulated watch started");
        Ok(PositionWatch { id, fixes: rx })
    }

    async fn clear_watch(&self, id: WatchId) {
        if let Some(task) = self.tasks.lock().remove(&id) {
            task.abort();
            debug!(watch = %id, "simulated watch cleared");
        }
    }

    async fn current_position(&self, _request: &FixRequest) -> Result<Fix, FixError> {
        if !self.enabled.load(Ordering::Relaxed) {
            return Err(FixError::new(FixErrorCode::PermissionDenied, "location is off"));
        }
        self.next_fix()
            .ok_or_else(|| FixError::new(FixErrorCode::PositionUnavailable, "empty route"))
    }
}
