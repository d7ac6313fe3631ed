use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use tether_core::host::{CameraDevice, CaptureOptions};
use tether_core::HostError;

/// Camera stand-in for headless hosts: each shot copies a still image into
/// the capture directory, producing a fresh raw file the pipeline owns.
pub struct FileCamera {
    source: PathBuf,
    capture_dir: PathBuf,
}

impl FileCamera {
    pub fn new(source: impl Into<PathBuf>, capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            capture_dir: capture_dir.into(),
        }
    }
}

#[async_trait]
impl CameraDevice for FileCamera {
    async fn take_photo(&self, options: &CaptureOptions) -> Result<PathBuf, HostError> {
        if !tokio::fs::try_exists(&self.source).await.unwrap_or(false) {
            return Err(HostError::Unavailable(format!(
                "no still image at {}",
                self.source.display()
            )));
        }
        tokio::fs::create_dir_all(&self.capture_dir).await?;
        let ext = self
            .source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg");
        let raw = self
            .capture_dir
            .join(format!("raw_{}.{ext}", Uuid::now_v7()));
        let _ = tokio::fs::copy(&self.source, &raw).await?;
        info!(path = %raw.display(), speed = options.prioritize_speed, "photo captured");
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn each_shot_is_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("still.jpg");
        std::fs::write(&still, b"jpeg-bytes").unwrap();

        let camera = FileCamera::new(&still, dir.path().join("shots"));
        let a = camera.take_photo(&CaptureOptions::default()).await.unwrap();
        let b = camera.take_photo(&CaptureOptions::default()).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(std::fs::read(&a).unwrap(), b"jpeg-bytes");
        assert!(still.exists());
    }

    #[tokio::test]
    async fn missing_source_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let camera = FileCamera::new(dir.path().join("none.jpg"), dir.path());
        let err = camera.take_photo(&CaptureOptions::default()).await.unwrap_err();
        assert!(matches!(err, HostError::Unavailable(_)));
    }
}
