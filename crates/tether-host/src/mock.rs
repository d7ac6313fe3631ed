//! Programmable host capabilities for deterministic bridge tests.
//!
//! Every mock records the calls made against it so tests can assert on
//! ordering (e.g. exactly one `ClearWatch` before the second `Watch`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use tether_core::host::{
    CameraDevice, CaptureOptions, ConnectivityMonitor, ImageResizer, LocationHistory,
    LocationProvider, ResizeRequest, ResizedImage, ShellSurface,
};
use tether_core::{
    Fix, FixError, FixErrorCode, FixRequest, HostError, PositionWatch, WatchId, WatchPolicy,
};

// ── Location ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum LocationCall {
    IsEnabled,
    Watch(WatchPolicy),
    ClearWatch(WatchId),
    CurrentPosition,
}

/// What the next one-shot fix request resolves to.
#[derive(Clone, Debug)]
pub enum OneShot {
    Fix(Fix),
    Fail(FixErrorCode),
    /// Never resolve; the caller's timeout has to fire.
    Hang,
}

/// Location service whose fixes are pushed by the test.
///
/// Cleared watches keep their sender so a test can deliver a fix after
/// `clear_watch`, the way a real host may.
pub struct MockLocation {
    enabled: AtomicBool,
    fail_watch: AtomicBool,
    next_id: AtomicU64,
    calls: Mutex<Vec<LocationCall>>,
    senders: Mutex<HashMap<WatchId, mpsc::Sender<Fix>>>,
    latest: Mutex<Option<WatchId>>,
    one_shot: Mutex<OneShot>,
}

impl Default for MockLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLocation {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            fail_watch: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            senders: Mutex::new(HashMap::new()),
            latest: Mutex::new(None),
            one_shot: Mutex::new(OneShot::Fail(FixErrorCode::PositionUnavailable)),
        }
    }

    pub fn disabled() -> Self {
        let mock = Self::new();
        mock.set_enabled(false);
        mock
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_fail_watch(&self, fail: bool) {
        self.fail_watch.store(fail, Ordering::Relaxed);
    }

    pub fn set_one_shot(&self, outcome: OneShot) {
        *self.one_shot.lock() = outcome;
    }

    pub fn calls(&self) -> Vec<LocationCall> {
        self.calls.lock().clone()
    }

    pub fn watch_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, LocationCall::Watch(_)))
            .count()
    }

    pub fn clear_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, LocationCall::ClearWatch(_)))
            .count()
    }

    /// Id of the most recently created watch.
    pub fn latest_watch(&self) -> Option<WatchId> {
        *self.latest.lock()
    }

    /// Deliver a fix on the given watch. Returns false if the receiving
    /// side is gone.
    pub async fn push_fix(&self, id: WatchId, fix: Fix) -> bool {
        let sender = self.senders.lock().get(&id).cloned();
        match sender {
            Some(tx) => tx.send(fix).await.is_ok(),
            None => false,
        }
    }

    /// Deliver a fix on the latest watch.
    pub async fn push(&self, fix: Fix) -> bool {
        match self.latest_watch() {
            Some(id) => self.push_fix(id, fix).await,
            None => false,
        }
    }
}

#[async_trait]
impl LocationProvider for MockLocation {
    async fn is_enabled(&self) -> Result<bool, HostError> {
        self.calls.lock().push(LocationCall::IsEnabled);
        Ok(self.enabled.load(Ordering::Relaxed))
    }

    async fn watch(&self, policy: &WatchPolicy) -> Result<PositionWatch, HostError> {
        self.calls.lock().push(LocationCall::Watch(policy.clone()));
        if self.fail_watch.load(Ordering::Relaxed) {
            return Err(HostError::Rejected("mock watch failure".into()));
        }
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(16);
        let _ = self.senders.lock().insert(id, tx);
        *self.latest.lock() = Some(id);
        Ok(PositionWatch { id, fixes: rx })
    }

    async fn clear_watch(&self, id: WatchId) {
        self.calls.lock().push(LocationCall::ClearWatch(id));
    }

    async fn current_position(&self, _request: &FixRequest) -> Result<Fix, FixError> {
        self.calls.lock().push(LocationCall::CurrentPosition);
        let outcome = self.one_shot.lock().clone();
        match outcome {
            OneShot::Fix(fix) => Ok(fix),
            OneShot::Fail(code) => Err(FixError::new(code, "mock position error")),
            OneShot::Hang => std::future::pending().await,
        }
    }
}

// ── Camera ──────────────────────────────────────────────────────────────

/// Camera that writes a small raw file per shot.
pub struct MockCamera {
    dir: PathBuf,
    fail: AtomicBool,
    shots: Mutex<Vec<CaptureOptions>>,
}

impl MockCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fail: AtomicBool::new(false),
            shots: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn shot_count(&self) -> usize {
        self.shots.lock().len()
    }

    pub fn shots(&self) -> Vec<CaptureOptions> {
        self.shots.lock().clone()
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    async fn take_photo(&self, options: &CaptureOptions) -> Result<PathBuf, HostError> {
        self.shots.lock().push(options.clone());
        if self.fail.load(Ordering::Relaxed) {
            return Err(HostError::Unavailable("mock camera failure".into()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("raw_{}.jpg", Uuid::now_v7()));
        tokio::fs::write(&path, b"raw-photo").await?;
        Ok(path)
    }
}

// ── Resizer ─────────────────────────────────────────────────────────────

type SizeFn = Box<dyn Fn(&ResizeRequest) -> u64 + Send + Sync>;

/// Resizer that writes files whose byte size is a function of the request.
///
/// The default model is `max_width * max_height * quality / 1000`, so the
/// 800x800 main variant needs one step below 85 to fit in 50 KB while the
/// thumbnail fits on the first attempt.
pub struct MockResizer {
    dir: PathBuf,
    size_of: SizeFn,
    requests: Mutex<Vec<ResizeRequest>>,
    fail: AtomicBool,
}

impl MockResizer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_size_fn(dir, |r| {
            u64::from(r.max_width) * u64::from(r.max_height) * u64::from(r.quality) / 1000
        })
    }

    pub fn with_size_fn(
        dir: impl Into<PathBuf>,
        size_of: impl Fn(&ResizeRequest) -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            dir: dir.into(),
            size_of: Box::new(size_of),
            requests: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn requests(&self) -> Vec<ResizeRequest> {
        self.requests.lock().clone()
    }

    /// Qualities tried for a given bounding box, in order.
    pub fn qualities_for(&self, max_width: u32) -> Vec<u8> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.max_width == max_width)
            .map(|r| r.quality)
            .collect()
    }
}

#[async_trait]
impl ImageResizer for MockResizer {
    async fn resize(&self, source: &Path, request: &ResizeRequest) -> Result<ResizedImage, HostError> {
        self.requests.lock().push(*request);
        if self.fail.load(Ordering::Relaxed) {
            return Err(HostError::Rejected("mock resize failure".into()));
        }
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(HostError::Rejected(format!("missing {}", source.display())));
        }
        let size = (self.size_of)(request);
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("resized_{}.jpg", Uuid::now_v7()));
        tokio::fs::write(&path, vec![0xFF_u8; size as usize]).await?;
        Ok(ResizedImage {
            path,
            size_bytes: size,
            width: request.max_width,
            height: request.max_height,
        })
    }
}

// ── Shell ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum ShellCall {
    Reload,
    Loading(bool),
    CameraVisible(bool),
    OpenUrl(String),
}

#[derive(Default)]
pub struct MockShell {
    calls: Mutex<Vec<ShellCall>>,
    fail_open: AtomicBool,
}

impl MockShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Relaxed);
    }

    pub fn calls(&self) -> Vec<ShellCall> {
        self.calls.lock().clone()
    }

    pub fn reload_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ShellCall::Reload))
            .count()
    }

    /// Last camera visibility set, if any.
    pub fn camera_visible(&self) -> Option<bool> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            ShellCall::CameraVisible(v) => Some(*v),
            _ => None,
        })
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ShellCall::OpenUrl(u) => Some(u.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ShellSurface for MockShell {
    fn reload(&self) {
        self.calls.lock().push(ShellCall::Reload);
    }

    fn set_loading(&self, loading: bool) {
        self.calls.lock().push(ShellCall::Loading(loading));
    }

    fn set_camera_visible(&self, visible: bool) {
        self.calls.lock().push(ShellCall::CameraVisible(visible));
    }

    fn open_url(&self, url: &str) -> Result<(), HostError> {
        self.calls.lock().push(ShellCall::OpenUrl(url.to_owned()));
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(HostError::Rejected("mock open failure".into()));
        }
        Ok(())
    }
}

// ── Connectivity ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockConnectivity {
    active: AtomicBool,
    starts: AtomicU64,
    stops: AtomicU64,
}

impl MockConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> u64 {
        self.stops.load(Ordering::Relaxed)
    }
}

impl ConnectivityMonitor for MockConnectivity {
    fn start_monitoring(&self) -> Result<(), HostError> {
        let _ = self.starts.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop_monitoring(&self) -> Result<(), HostError> {
        let _ = self.stops.fetch_add(1, Ordering::Relaxed);
        self.active.store(false, Ordering::Relaxed);
        Ok(())
    }
}

// ── History ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryWrite {
    pub subject_id: String,
    pub group_key: String,
    pub lat: String,
    pub lng: String,
}

#[derive(Default)]
pub struct MockHistory {
    writes: Mutex<Vec<HistoryWrite>>,
    fail: AtomicBool,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn writes(&self) -> Vec<HistoryWrite> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl LocationHistory for MockHistory {
    async fn record(
        &self,
        subject_id: &str,
        group_key: &str,
        lat: &str,
        lng: &str,
    ) -> Result<(), HostError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(HostError::Unavailable("mock history offline".into()));
        }
        self.writes.lock().push(HistoryWrite {
            subject_id: subject_id.to_owned(),
            group_key: group_key.to_owned(),
            lat: lat.to_owned(),
            lng: lng.to_owned(),
        });
        Ok(())
    }
}
