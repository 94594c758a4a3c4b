//! Default media transformer backed by the `image` crate.
//!
//! Decoding and re-encoding are CPU-bound, so every operation runs inside
//! `spawn_blocking`. The per-file timeout ceiling is enforced by the
//! reconciler, not here.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{Rgb, RgbImage, imageops};
use tracing::debug;

use crate::error::{GalleryError, Result};
use crate::ports::MediaTransformer;

const PLACEHOLDER_WIDTH: u32 = 640;
const PLACEHOLDER_HEIGHT: u32 = 360;
const LETTERBOX_FILL: Rgb<u8> = Rgb([16, 16, 16]);

#[derive(Debug, Default, Clone)]
pub struct ImageTransformer;

impl ImageTransformer {
    pub fn new() -> Self {
        ImageTransformer
    }
}

#[async_trait]
impl MediaTransformer for ImageTransformer {
    async fn transform_image(
        &self,
        src: &Path,
        dst: &Path,
        max_width: u32,
        max_height: u32,
    ) -> Result<()> {
        let src = src.to_path_buf();
        let dst = dst.to_path_buf();
        run_blocking(move || letterbox_resize(&src, &dst, max_width, max_height)).await
    }

    async fn animated_poster(&self, src: &Path, dst: &Path) -> Result<()> {
        let src = src.to_path_buf();
        let dst = dst.to_path_buf();
        // `image::open` on a GIF decodes the first frame, which is exactly
        // the poster we want.
        run_blocking(move || {
            let frame = image::open(&src)?;
            ensure_parent(&dst)?;
            frame.to_rgb8().save(&dst)?;
            Ok(())
        })
        .await
    }

    async fn copy_verbatim(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, dst).await?;
        Ok(())
    }

    async fn synthesize_placeholder(&self, dst: &Path, label: &str) -> Result<()> {
        debug!("synthesizing placeholder poster for {label}");
        let dst = dst.to_path_buf();
        run_blocking(move || {
            let canvas = placeholder_canvas(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
            ensure_parent(&dst)?;
            canvas.save(&dst)?;
            Ok(())
        })
        .await
    }
}

async fn run_blocking<F>(work: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| GalleryError::Internal(format!("transform task panicked: {err}")))?
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Fit the source image inside `max_width` x `max_height` without cropping,
/// centering it on a letterbox canvas when the aspect ratios differ.
fn letterbox_resize(src: &Path, dst: &Path, max_width: u32, max_height: u32) -> Result<()> {
    let source = image::open(src)?;
    let resized = source.resize(max_width, max_height, imageops::FilterType::Lanczos3);

    let mut canvas = RgbImage::from_pixel(max_width, max_height, LETTERBOX_FILL);
    let x = (max_width.saturating_sub(resized.width())) / 2;
    let y = (max_height.saturating_sub(resized.height())) / 2;
    imageops::overlay(&mut canvas, &resized.to_rgb8(), i64::from(x), i64::from(y));

    ensure_parent(dst)?;
    canvas.save(dst)?;
    Ok(())
}

fn placeholder_canvas(width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, LETTERBOX_FILL);
    draw_play_triangle(&mut canvas);
    canvas
}

/// Simple centered play glyph so video entries are recognizable without
/// decoding a real frame.
fn draw_play_triangle(canvas: &mut RgbImage) {
    let (width, height) = canvas.dimensions();
    let size = height / 4;
    let left = width / 2 - size / 2;
    let top = height / 2 - size / 2;
    let glyph = Rgb([200, 200, 200]);

    for row in 0..size {
        // Triangle pointing right: row width tapers towards the middle.
        let half = size / 2;
        let distance = row.abs_diff(half);
        let span = (size - distance * 2).saturating_mul(3) / 4;
        for col in 0..span {
            canvas.put_pixel(left + col, top + row, glyph);
        }
    }
}

/// Derive `<stem>_thumb.jpg` inside the per-session thumbnail directory.
pub fn thumbnail_path(thumbs_dir: &Path, session_dir: &str, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    thumbs_dir
        .join(session_dir)
        .join(format!("{stem}_thumb.jpg"))
}

/// Derive `<stem>_poster.png` for animated and video originals.
pub fn poster_path(thumbs_dir: &Path, session_dir: &str, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    thumbs_dir
        .join(session_dir)
        .join(format!("{stem}_poster.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    fn write_test_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([250, 60, 60]))
            .save(path)
            .unwrap();
    }

    #[tokio::test]
    async fn letterboxes_without_cropping() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("wide.png");
        let dst = tmp.path().join("wide_thumb.png");
        write_test_png(&src, 400, 100);

        ImageTransformer::new()
            .transform_image(&src, &dst, 200, 200)
            .await
            .unwrap();

        let out = image::open(&dst).unwrap();
        assert_eq!((out.width(), out.height()), (200, 200));
        // Letterbox bands above and below the 4:1 content.
        let rgb = out.to_rgb8();
        assert_eq!(*rgb.get_pixel(100, 5), LETTERBOX_FILL);
        assert_ne!(*rgb.get_pixel(100, 100), LETTERBOX_FILL);
    }

    #[tokio::test]
    async fn placeholder_has_expected_dimensions() {
        let tmp = tempdir().unwrap();
        let dst = tmp.path().join("clip_poster.png");

        ImageTransformer::new()
            .synthesize_placeholder(&dst, "clip.mp4")
            .await
            .unwrap();

        let out = image::open(&dst).unwrap();
        assert_eq!(
            (out.width(), out.height()),
            (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)
        );
    }

    #[tokio::test]
    async fn copy_verbatim_creates_parents() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("orig.gif");
        tokio::fs::write(&src, b"GIF89a").await.unwrap();
        let dst = tmp.path().join("media").join("sess").join("orig.gif");

        ImageTransformer::new()
            .copy_verbatim(&src, &dst)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"GIF89a");
    }

    #[tokio::test]
    async fn corrupt_image_surfaces_an_error() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("broken.jpg");
        tokio::fs::write(&src, b"not an image").await.unwrap();
        let dst = tmp.path().join("broken_thumb.jpg");

        let result = ImageTransformer::new()
            .transform_image(&src, &dst, 100, 100)
            .await;
        assert!(result.is_err());
    }
}
