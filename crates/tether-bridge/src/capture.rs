//! Photo capture and size-budgeted compression.
//!
//! `Idle -> Capturing -> Previewing -> Idle`. One capture produces a raw
//! file plus a main image and a thumbnail, each compressed by stepping the
//! JPEG quality down until the variant fits its byte budget or the quality
//! floor is reached. All three files are deleted when the session ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use tether_core::host::{CameraDevice, CaptureOptions, ImageResizer, ResizeRequest, ResizedImage};
use tether_core::{BridgeError, HostError, OutboundMessage};
use tether_settings::{CaptureSettings, VariantBudget};

use crate::cleanup;
use crate::outbox::Outbox;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressionAttempt {
    pub quality: u8,
    pub size_bytes: u64,
}

/// Quality schedule of the compression loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityLadder {
    pub start: u8,
    pub step: u8,
    pub floor: u8,
}

impl QualityLadder {
    fn from_settings(settings: &CaptureSettings) -> Self {
        Self {
            start: settings.start_quality,
            step: settings.quality_step,
            floor: settings.quality_floor,
        }
    }

    /// The quality after `quality`, or `None` once the floor would be crossed.
    pub fn next(&self, quality: u8) -> Option<u8> {
        quality
            .checked_sub(self.step)
            .filter(|q| *q >= self.floor && self.step > 0)
    }
}

/// The accepted output of [`compress_until_limit`] and every attempt made.
#[derive(Clone, Debug)]
pub struct Compressed {
    pub image: ResizedImage,
    pub attempts: Vec<CompressionAttempt>,
}

impl Compressed {
    pub fn within_budget(&self, budget: &VariantBudget) -> bool {
        self.image.size_bytes <= budget.max_bytes
    }
}

/// Resize `source` into `budget`, lowering quality each round. When the
/// floor is reached first the last attempt is accepted as is. Superseded
/// attempts are deleted as the loop goes.
pub async fn compress_until_limit(
    resizer: &dyn ImageResizer,
    source: &Path,
    budget: &VariantBudget,
    ladder: QualityLadder,
) -> Result<Compressed, HostError> {
    let mut quality = ladder.start;
    let mut attempts = Vec::new();
    let mut best: Option<ResizedImage> = None;

    loop {
        let request = ResizeRequest {
            max_width: budget.max_width,
            max_height: budget.max_height,
            quality,
        };
        let image = match resizer.resize(source, &request).await {
            Ok(image) => image,
            Err(e) => {
                if let Some(prev) = &best {
                    let _ = cleanup::remove_all([prev.path.as_path()]).await;
                }
                return Err(e);
            }
        };
        attempts.push(CompressionAttempt {
            quality,
            size_bytes: image.size_bytes,
        });
        debug!(quality, size = image.size_bytes, budget = budget.max_bytes, "compression attempt");

        let fits = image.size_bytes <= budget.max_bytes;
        if let Some(prev) = best.replace(image) {
            let _ = cleanup::remove_all([prev.path.as_path()]).await;
        }
        if fits {
            break;
        }
        match ladder.next(quality) {
            Some(next) => quality = next,
            None => {
                debug!(quality, "quality floor reached, accepting last attempt");
                break;
            }
        }
    }

    match best {
        Some(image) => Ok(Compressed { image, attempts }),
        None => Err(HostError::Rejected("no compression attempt made".into())),
    }
}

async fn data_uri(path: &Path) -> Result<String, HostError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(bytes)))
}

/// The three files of one capture and their encoded previews.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSession {
    pub raw_path: PathBuf,
    pub resized_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub image: String,
    pub thumbnail_image: String,
}

impl CaptureSession {
    pub fn paths(&self) -> [&Path; 3] {
        [
            self.raw_path.as_path(),
            self.resized_path.as_path(),
            self.thumbnail_path.as_path(),
        ]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CaptureState {
    Idle,
    Capturing,
    Previewing(CaptureSession),
}

/// Self-contained capture work, runnable off the event loop.
pub struct CaptureJob {
    camera: Arc<dyn CameraDevice>,
    resizer: Arc<dyn ImageResizer>,
    options: CaptureOptions,
    ladder: QualityLadder,
    main: VariantBudget,
    thumbnail: VariantBudget,
}

impl CaptureJob {
    pub async fn run(self) -> Result<CaptureSession, BridgeError> {
        let raw = self.camera.take_photo(&self.options).await?;

        let main = match compress_until_limit(self.resizer.as_ref(), &raw, &self.main, self.ladder).await {
            Ok(c) => c,
            Err(e) => {
                let _ = cleanup::remove_all([raw.as_path()]).await;
                return Err(e.into());
            }
        };
        let thumb =
            match compress_until_limit(self.resizer.as_ref(), &raw, &self.thumbnail, self.ladder).await {
                Ok(c) => c,
                Err(e) => {
                    let _ = cleanup::remove_all([raw.as_path(), main.image.path.as_path()]).await;
                    return Err(e.into());
                }
            };

        if !main.within_budget(&self.main) || !thumb.within_budget(&self.thumbnail) {
            info!(
                main = main.image.size_bytes,
                thumbnail = thumb.image.size_bytes,
                "budget not met at quality floor"
            );
        }

        let encoded = async {
            let image = data_uri(&main.image.path).await?;
            let thumbnail_image = data_uri(&thumb.image.path).await?;
            Ok::<_, HostError>((image, thumbnail_image))
        }
        .await;

        let session_paths = [
            raw.as_path(),
            main.image.path.as_path(),
            thumb.image.path.as_path(),
        ];
        match encoded {
            Ok((image, thumbnail_image)) => {
                info!(
                    main_attempts = main.attempts.len(),
                    thumb_attempts = thumb.attempts.len(),
                    main_size = main.image.size_bytes,
                    thumb_size = thumb.image.size_bytes,
                    "capture ready"
                );
                Ok(CaptureSession {
                    raw_path: raw.clone(),
                    resized_path: main.image.path.clone(),
                    thumbnail_path: thumb.image.path.clone(),
                    image,
                    thumbnail_image,
                })
            }
            Err(e) => {
                let _ = cleanup::remove_all(session_paths).await;
                Err(e.into())
            }
        }
    }
}

pub struct CapturePipeline {
    camera: Arc<dyn CameraDevice>,
    resizer: Arc<dyn ImageResizer>,
    outbox: Outbox,
    settings: CaptureSettings,
    state: CaptureState,
    last_sent: Option<Instant>,
}

impl CapturePipeline {
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        resizer: Arc<dyn ImageResizer>,
        outbox: Outbox,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            camera,
            resizer,
            outbox,
            settings,
            state: CaptureState::Idle,
            last_sent: None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CaptureState::Idle
    }

    /// Enter `Capturing` and hand back the work to run. Callers must only
    /// do this from `Idle`; the camera UI gates the shutter.
    pub fn start_capture(&mut self) -> CaptureJob {
        self.state = CaptureState::Capturing;
        CaptureJob {
            camera: Arc::clone(&self.camera),
            resizer: Arc::clone(&self.resizer),
            options: CaptureOptions {
                prioritize_speed: true,
                quality: self.settings.capture_quality,
            },
            ladder: QualityLadder::from_settings(&self.settings),
            main: self.settings.main,
            thumbnail: self.settings.thumbnail,
        }
    }

    /// Apply a finished job. A result that arrives after the session was
    /// cancelled is discarded along with its files.
    pub async fn finish_capture(
        &mut self,
        result: Result<CaptureSession, BridgeError>,
    ) -> Result<(), BridgeError> {
        if self.state != CaptureState::Capturing {
            if let Ok(session) = result {
                debug!("capture finished after cancel, discarding");
                let _ = cleanup::remove_all(session.paths()).await;
            }
            return Ok(());
        }
        match result {
            Ok(session) => {
                self.state = CaptureState::Previewing(session);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "capture failed");
                self.state = CaptureState::Idle;
                Err(e)
            }
        }
    }

    /// Capture and compress in place.
    pub async fn capture(&mut self) -> Result<(), BridgeError> {
        let job = self.start_capture();
        let result = job.run().await;
        self.finish_capture(result).await
    }

    /// Send the previewed image, then end the session. Sends at most once
    /// per cooldown window. Returns whether an image was sent.
    pub async fn confirm(&mut self) -> bool {
        let session = match std::mem::replace(&mut self.state, CaptureState::Idle) {
            CaptureState::Previewing(session) => session,
            other => {
                self.state = other;
                debug!("confirm without a preview");
                return false;
            }
        };

        let cooldown = Duration::from_millis(self.settings.confirm_cooldown_ms);
        let throttled = self.last_sent.is_some_and(|t| t.elapsed() <= cooldown);
        let sent = if throttled {
            debug!("capture result throttled");
            false
        } else {
            self.last_sent = Some(Instant::now());
            self.outbox.send(OutboundMessage::CaptureResult {
                image: session.image.clone(),
                thumbnail_image: session.thumbnail_image.clone(),
            })
        };

        let failed = cleanup::remove_all(session.paths()).await;
        info!(sent, cleanup_failures = failed, "capture confirmed");
        sent
    }

    /// Discard the session without sending.
    pub async fn cancel(&mut self) {
        match std::mem::replace(&mut self.state, CaptureState::Idle) {
            CaptureState::Previewing(session) => {
                let failed = cleanup::remove_all(session.paths()).await;
                info!(cleanup_failures = failed, "capture cancelled");
            }
            CaptureState::Capturing => debug!("capture cancelled while in flight"),
            CaptureState::Idle => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_host::mock::{MockCamera, MockResizer};
    use tokio::sync::mpsc;

    struct Harness {
        pipeline: CapturePipeline,
        camera: Arc<MockCamera>,
        resizer: Arc<MockResizer>,
        surface: mpsc::Receiver<String>,
        dir: tempfile::TempDir,
    }

    fn harness_with(resizer: impl FnOnce(&Path) -> MockResizer) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let camera = Arc::new(MockCamera::new(dir.path().join("raw")));
        let resizer = Arc::new(resizer(&dir.path().join("out")));
        let (outbox, surface) = Outbox::channel(8);
        let pipeline = CapturePipeline::new(
            camera.clone(),
            resizer.clone(),
            outbox,
            CaptureSettings::default(),
        );
        Harness {
            pipeline,
            camera,
            resizer,
            surface,
            dir,
        }
    }

    fn harness() -> Harness {
        harness_with(|out| MockResizer::new(out))
    }

    fn files_under(dir: &Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .map(|e| {
                let p = e.unwrap().path();
                if p.is_dir() {
                    files_under(&p)
                } else {
                    1
                }
            })
            .sum()
    }

    const LADDER: QualityLadder = QualityLadder {
        start: 85,
        step: 10,
        floor: 30,
    };

    #[test]
    fn ladder_stops_above_floor() {
        let mut seq = vec![LADDER.start];
        while let Some(q) = LADDER.next(*seq.last().unwrap()) {
            seq.push(q);
        }
        assert_eq!(seq, vec![85, 75, 65, 55, 45, 35]);
    }

    #[tokio::test]
    async fn oversize_image_walks_whole_ladder_and_keeps_last() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("raw.jpg");
        std::fs::write(&src, b"raw").unwrap();
        let resizer = MockResizer::with_size_fn(dir.path().join("out"), |_| 100_000);

        let budget = CaptureSettings::default().main;
        let out = compress_until_limit(&resizer, &src, &budget, LADDER).await.unwrap();

        let qualities: Vec<u8> = out.attempts.iter().map(|a| a.quality).collect();
        assert_eq!(qualities, vec![85, 75, 65, 55, 45, 35]);
        assert!(qualities.iter().all(|q| *q >= 30));
        assert!(!out.within_budget(&budget));
        assert!(out.image.path.exists());
        assert_eq!(files_under(&dir.path().join("out")), 1);
    }

    #[tokio::test]
    async fn loop_stops_once_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("raw.jpg");
        std::fs::write(&src, b"raw").unwrap();
        let resizer = MockResizer::new(dir.path().join("out"));
        let settings = CaptureSettings::default();

        let main = compress_until_limit(&resizer, &src, &settings.main, LADDER).await.unwrap();
        let thumb = compress_until_limit(&resizer, &src, &settings.thumbnail, LADDER)
            .await
            .unwrap();

        assert_eq!(
            main.attempts,
            vec![
                CompressionAttempt { quality: 85, size_bytes: 54_400 },
                CompressionAttempt { quality: 75, size_bytes: 48_000 },
            ]
        );
        assert_eq!(thumb.attempts.len(), 1);
        assert!(main.within_budget(&settings.main));
    }

    #[tokio::test]
    async fn capture_produces_data_uris() {
        let mut h = harness();
        h.pipeline.capture().await.unwrap();

        let CaptureState::Previewing(session) = h.pipeline.state().clone() else {
            panic!("expected preview");
        };
        assert!(session.image.starts_with(DATA_URI_PREFIX));
        assert!(session.thumbnail_image.starts_with(DATA_URI_PREFIX));
        let decoded = STANDARD
            .decode(&session.image[DATA_URI_PREFIX.len()..])
            .unwrap();
        assert_eq!(decoded.len(), 48_000);
        assert!(session.paths().iter().all(|p| p.exists()));
        assert_eq!(h.camera.shots()[0].quality, 80);
        assert!(h.camera.shots()[0].prioritize_speed);
    }

    #[tokio::test]
    async fn confirm_sends_once_and_cleans_up() {
        let mut h = harness();
        h.pipeline.capture().await.unwrap();
        assert!(h.pipeline.confirm().await);
        assert!(!h.pipeline.confirm().await);

        let wire = h.surface.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert!(value["image"].as_str().unwrap().starts_with(DATA_URI_PREFIX));
        assert!(value["thumbnailImage"].is_string());
        assert!(value.get("type").is_none());
        assert!(h.surface.try_recv().is_err());

        assert!(h.pipeline.is_idle());
        assert_eq!(files_under(h.dir.path()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_within_cooldown_send_one_image() {
        let mut h = harness();
        h.pipeline.capture().await.unwrap();
        assert!(h.pipeline.confirm().await);

        tokio::time::advance(Duration::from_millis(1_000)).await;
        h.pipeline.capture().await.unwrap();
        assert!(!h.pipeline.confirm().await);
        assert_eq!(files_under(h.dir.path()), 0);

        tokio::time::advance(Duration::from_millis(2_500)).await;
        h.pipeline.capture().await.unwrap();
        assert!(h.pipeline.confirm().await);

        let mut sent = 0;
        while h.surface.try_recv().is_ok() {
            sent += 1;
        }
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn cancel_discards_without_sending() {
        let mut h = harness();
        h.pipeline.capture().await.unwrap();
        h.pipeline.cancel().await;

        assert!(h.pipeline.is_idle());
        assert!(h.surface.try_recv().is_err());
        assert_eq!(files_under(h.dir.path()), 0);
    }

    #[tokio::test]
    async fn camera_failure_returns_to_idle() {
        let mut h = harness();
        h.camera.set_fail(true);
        let err = h.pipeline.capture().await.unwrap_err();
        assert_eq!(err.error_kind(), "capability_disabled");
        assert!(h.pipeline.is_idle());
    }

    #[tokio::test]
    async fn resize_failure_removes_raw_file() {
        let mut h = harness();
        h.resizer.set_fail(true);
        let err = h.pipeline.capture().await.unwrap_err();
        assert!(err.is_failure());
        assert!(h.pipeline.is_idle());
        assert_eq!(h.camera.shot_count(), 1);
        assert_eq!(files_under(h.dir.path()), 0);
    }

    #[tokio::test]
    async fn result_after_cancel_is_discarded() {
        let mut h = harness();
        let job = h.pipeline.start_capture();
        h.pipeline.cancel().await;
        let result = job.run().await;
        assert!(result.is_ok());

        h.pipeline.finish_capture(result).await.unwrap();
        assert!(h.pipeline.is_idle());
        assert_eq!(files_under(h.dir.path()), 0);
    }

    #[tokio::test]
    async fn resizer_sees_both_budgets() {
        let mut h = harness();
        h.pipeline.capture().await.unwrap();
        assert_eq!(h.resizer.qualities_for(800), vec![85, 75]);
        assert_eq!(h.resizer.qualities_for(180), vec![85]);
    }
}
