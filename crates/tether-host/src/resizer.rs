//! JPEG resize-and-encode on top of the `image` crate.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;
use uuid::Uuid;

use tether_core::host::{ImageResizer, ResizeRequest, ResizedImage};
use tether_core::HostError;

/// Writes each resized variant as a fresh `resized_<uuid>.jpg` under
/// `output_dir`. Decoding and encoding run on the blocking pool.
pub struct JpegResizer {
    output_dir: PathBuf,
}

impl JpegResizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

/// Scale `(w, h)` down to fit inside `(max_w, max_h)` keeping the aspect
/// ratio. Never scales up.
pub fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w <= max_w && h <= max_h {
        return (w, h);
    }
    let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64);
    let nw = ((w as f64 * scale).round() as u32).clamp(1, max_w);
    let nh = ((h as f64 * scale).round() as u32).clamp(1, max_h);
    (nw, nh)
}

/// Encode an image as baseline JPEG at the given quality.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, HostError> {
    let rgb = img.to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| HostError::Rejected(format!("jpeg encode: {e}")))?;
    Ok(buf.into_inner())
}

fn resize_blocking(
    source: &Path,
    request: ResizeRequest,
    output: &Path,
) -> Result<ResizedImage, HostError> {
    let img = image::open(source)
        .map_err(|e| HostError::Rejected(format!("decode {}: {e}", source.display())))?;
    let (w, h) = fit_within(img.width(), img.height(), request.max_width, request.max_height);
    let scaled = if (w, h) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Triangle)
    };
    let bytes = encode_jpeg(&scaled, request.quality)?;
    std::fs::write(output, &bytes)?;
    Ok(ResizedImage {
        path: output.to_owned(),
        size_bytes: bytes.len() as u64,
        width: w,
        height: h,
    })
}

#[async_trait]
impl ImageResizer for JpegResizer {
    async fn resize(&self, source: &Path, request: &ResizeRequest) -> Result<ResizedImage, HostError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self
            .output_dir
            .join(format!("resized_{}.jpg", Uuid::now_v7()));
        let source = source.to_owned();
        let request = *request;

        let resized = tokio::task::spawn_blocking(move || resize_blocking(&source, request, &output))
            .await
            .map_err(|e| HostError::Rejected(format!("resize task: {e}")))??;

        debug!(
            quality = request.quality,
            width = resized.width,
            height = resized.height,
            size = resized.size_bytes,
            "resized image"
        );
        Ok(resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_gradient(path: &Path, w: u32, h: u32) {
        let img = RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn fit_within_scales_down_preserving_ratio() {
        assert_eq!(fit_within(1600, 1200, 800, 800), (800, 600));
        assert_eq!(fit_within(1200, 1600, 180, 180), (135, 180));
    }

    #[test]
    fn fit_within_never_scales_up() {
        assert_eq!(fit_within(100, 50, 800, 800), (100, 50));
    }

    #[test]
    fn lower_quality_is_not_larger() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(256, 256, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        }));
        let high = encode_jpeg(&img, 85).unwrap();
        let low = encode_jpeg(&img, 35).unwrap();
        assert!(low.len() <= high.len());
    }

    #[tokio::test]
    async fn resize_writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("raw.png");
        write_gradient(&source, 400, 300);

        let resizer = JpegResizer::new(dir.path().join("out"));
        let resized = resizer
            .resize(
                &source,
                &ResizeRequest {
                    max_width: 180,
                    max_height: 180,
                    quality: 75,
                },
            )
            .await
            .unwrap();

        assert_eq!((resized.width, resized.height), (180, 135));
        assert!(resized.path.exists());
        assert_eq!(
            std::fs::metadata(&resized.path).unwrap().len(),
            resized.size_bytes
        );
        assert!(source.exists());
    }

    #[tokio::test]
    async fn resize_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let resizer = JpegResizer::new(dir.path());
        let err = resizer
            .resize(
                &dir.path().join("missing.jpg"),
                &ResizeRequest {
                    max_width: 10,
                    max_height: 10,
                    quality: 50,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Rejected(_)));
    }
}
