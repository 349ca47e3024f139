//! File-backed [`ImageCapture`] for headless use.
//!
//! The "camera" copies a source file into the capture directory, the
//! "gallery" hands back an existing file, and cropping re-encodes to JPEG.

use crate::screen::{ImageCapture, ImageHandle};
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::PathBuf;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

const JPEG_EXTENSION: &str = "jpg";

/// Region to keep when cropping, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CropRectError {
    #[error("invalid crop value in '{input}': {source}")]
    InvalidValue {
        input: String,
        #[source]
        source: ParseIntError,
    },
    #[error("expected X,Y,WIDTH,HEIGHT, got '{0}'")]
    WrongArity(String),
}

impl FromStr for CropRect {
    type Err = CropRectError;

    /// Parses `X,Y,WIDTH,HEIGHT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| CropRectError::InvalidValue {
                input: s.to_string(),
                source,
            })?;

        match values.as_slice() {
            [x, y, width, height] => Ok(CropRect {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            }),
            _ => Err(CropRectError::WrongArity(s.to_string())),
        }
    }
}

/// Decode `bytes`, keep `rect` (or everything), and re-encode as JPEG.
pub fn crop_to_jpeg(bytes: &[u8], rect: Option<CropRect>) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).context("Failed to decode image")?;

    let cropped = match rect {
        Some(r) => {
            let fits = r.width > 0
                && r.height > 0
                && r.x.checked_add(r.width).is_some_and(|right| right <= decoded.width())
                && r.y.checked_add(r.height).is_some_and(|bottom| bottom <= decoded.height());
            if !fits {
                anyhow::bail!(
                    "Crop {:?} does not fit a {}x{} image",
                    r,
                    decoded.width(),
                    decoded.height()
                );
            }
            decoded.crop_imm(r.x, r.y, r.width, r.height)
        }
        None => decoded,
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(cropped.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)
        .context("Failed to encode JPEG")?;
    Ok(out.into_inner())
}

#[derive(Debug, Clone)]
pub struct FileImageCapture {
    source: PathBuf,
    capture_dir: PathBuf,
    crop: Option<CropRect>,
}

impl FileImageCapture {
    pub fn new(source: impl Into<PathBuf>, capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            capture_dir: capture_dir.into(),
            crop: None,
        }
    }

    pub fn with_crop(mut self, crop: Option<CropRect>) -> Self {
        self.crop = crop;
        self
    }

    async fn output_path(&self, prefix: &str, extension: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.capture_dir)
            .await
            .with_context(|| format!("Failed to create capture directory {:?}", self.capture_dir))?;
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%3f");
        Ok(self
            .capture_dir
            .join(format!("{}-{}.{}", prefix, stamp, extension)))
    }
}

#[async_trait]
impl ImageCapture for FileImageCapture {
    async fn capture_image(&self) -> Result<ImageHandle> {
        let extension = self
            .source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(JPEG_EXTENSION)
            .to_string();
        let target = self.output_path("capture", &extension).await?;
        tokio::fs::copy(&self.source, &target)
            .await
            .with_context(|| format!("Failed to capture {:?}", self.source))?;
        tracing::debug!("Captured {:?} to {:?}", self.source, target);
        Ok(ImageHandle::new(target))
    }

    async fn pick_from_gallery(&self) -> Result<Option<ImageHandle>> {
        let exists = tokio::fs::try_exists(&self.source)
            .await
            .with_context(|| format!("Failed to inspect {:?}", self.source))?;
        Ok(exists.then(|| ImageHandle::new(self.source.clone())))
    }

    async fn crop_image(&self, image: ImageHandle) -> Result<Option<ImageHandle>> {
        let bytes = tokio::fs::read(image.path())
            .await
            .with_context(|| format!("Failed to read {:?}", image.path()))?;
        let rect = self.crop;

        let encoded = tokio::task::spawn_blocking(move || crop_to_jpeg(&bytes, rect))
            .await
            .context("Crop task failed")?;
        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!("Crop failed: {:#}", e);
                return Ok(None);
            }
        };

        let target = self.output_path("crop", JPEG_EXTENSION).await?;
        tokio::fs::write(&target, encoded)
            .await
            .with_context(|| format!("Failed to write {:?}", target))?;
        Ok(Some(ImageHandle::new(target)))
    }
}
