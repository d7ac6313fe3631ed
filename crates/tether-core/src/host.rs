//! Capabilities the native container provides to the bridge.
//!
//! Each trait is a seam: the desktop shell implements them against real
//! devices and files, tests implement them with recording mocks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::{FixError, HostError};
use crate::position::{Fix, FixRequest, PositionWatch, WatchId, WatchPolicy};

/// Host location service.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Whether the device location service is switched on.
    async fn is_enabled(&self) -> Result<bool, HostError>;

    /// Register a periodic watch.
    async fn watch(&self, policy: &WatchPolicy) -> Result<PositionWatch, HostError>;

    /// Release a watch. Fixes may still trickle in after this returns.
    async fn clear_watch(&self, id: WatchId);

    /// Request a single fix. The host applies `request.timeout` itself
    /// where it can; callers enforce it independently.
    async fn current_position(&self, request: &FixRequest) -> Result<Fix, FixError>;
}

/// Hints for a single photo capture.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureOptions {
    pub prioritize_speed: bool,
    /// JPEG quality hint for the raw capture, 0-100.
    pub quality: u8,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            prioritize_speed: true,
            quality: 80,
        }
    }
}

/// Host camera.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Take one photo and return the path of the raw file.
    async fn take_photo(&self, options: &CaptureOptions) -> Result<PathBuf, HostError>;
}

/// One resize-and-encode pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeRequest {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 0-100.
    pub quality: u8,
}

/// A JPEG written by [`ImageResizer::resize`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResizedImage {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
}

/// Produces a new scaled-down JPEG file from a source image. Never scales up.
#[async_trait]
pub trait ImageResizer: Send + Sync {
    async fn resize(&self, source: &Path, request: &ResizeRequest) -> Result<ResizedImage, HostError>;
}

/// The native container around the content surface.
pub trait ShellSurface: Send + Sync {
    /// Recreate the content surface from scratch, discarding in-page state.
    fn reload(&self);

    /// Show or hide the loading screen.
    fn set_loading(&self, loading: bool);

    /// Show or hide the camera UI.
    fn set_camera_visible(&self, visible: bool);

    /// Hand a URL to the OS (maps app, browser).
    fn open_url(&self, url: &str) -> Result<(), HostError>;
}

/// Native connectivity monitor that emits connectivity events while running.
pub trait ConnectivityMonitor: Send + Sync {
    fn start_monitoring(&self) -> Result<(), HostError>;
    fn stop_monitoring(&self) -> Result<(), HostError>;
}

/// Backend persistence of the latest known position per subject.
///
/// Pairs are written under `group_key` then `subject_id`. Empty `lat`/`lng`
/// strings are a valid "no fix" record.
#[async_trait]
pub trait LocationHistory: Send + Sync {
    async fn record(
        &self,
        subject_id: &str,
        group_key: &str,
        lat: &str,
        lng: &str,
    ) -> Result<(), HostError>;
}
