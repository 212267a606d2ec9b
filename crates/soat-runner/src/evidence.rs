//! Screenshot artifacts.

use crate::browser::{BoundingBox, Driver, Element};
use crate::{Error, Result};
use chrono::{DateTime, Local};
use image::{GenericImageView, ImageFormat};
use std::fs::OpenOptions;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What an artifact shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturedRegion {
    Element,
    FullPage,
}

/// An image written to disk. Never modified after creation.
#[derive(Debug, Clone)]
pub struct EvidenceArtifact {
    pub path: PathBuf,
    pub region: CapturedRegion,
    pub timestamp: DateTime<Local>,
}

/// Writes timestamped PNGs into one directory.
#[derive(Debug, Clone)]
pub struct EvidenceCapture {
    dir: PathBuf,
}

impl EvidenceCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Screenshot of one element.
    pub async fn capture_region<D: Driver + ?Sized>(
        &self,
        driver: &D,
        element: &Element,
        name: &str,
    ) -> Result<EvidenceArtifact> {
        let png = driver.screenshot_element(element).await?;
        self.store(name, &png, CapturedRegion::Element)
    }

    /// Screenshot of the whole viewport.
    pub async fn capture_full_page<D: Driver + ?Sized>(
        &self,
        driver: &D,
        name: &str,
    ) -> Result<EvidenceArtifact> {
        let png = driver.screenshot().await?;
        self.store(name, &png, CapturedRegion::FullPage)
    }

    /// Element screenshot, or a full page named `fallback` if that fails.
    pub async fn capture_region_or_page<D: Driver + ?Sized>(
        &self,
        driver: &D,
        element: Option<&Element>,
        name: &str,
        fallback: &str,
    ) -> Result<EvidenceArtifact> {
        if let Some(element) = element {
            match self.capture_region(driver, element, name).await {
                Ok(artifact) => return Ok(artifact),
                Err(e) => warn!("Element capture of {} failed: {}", element.describe(), e),
            }
        }
        self.capture_full_page(driver, fallback).await
    }

    fn store(&self, name: &str, png: &[u8], region: CapturedRegion) -> Result<EvidenceArtifact> {
        if png.is_empty() {
            return Err(Error::Evidence(format!("empty image for '{}'", name)));
        }
        std::fs::create_dir_all(&self.dir)?;

        let timestamp = Local::now();
        let stem = format!("{}_{}", name, timestamp.format("%Y%m%d_%H%M%S"));

        for n in 0u32.. {
            let file = if n == 0 {
                format!("{}.png", stem)
            } else {
                format!("{}_{}.png", stem, n)
            };
            let path = self.dir.join(file);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut f) => {
                    f.write_all(png)?;
                    info!("Saved screenshot: {}", path.display());
                    return Ok(EvidenceArtifact {
                        path,
                        region,
                        timestamp,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Evidence(format!("no free file name for '{}'", stem)))
    }
}

/// Crop a viewport PNG to a CSS-pixel box, scaled by the device pixel ratio.
pub fn crop_png(png: &[u8], bbox: BoundingBox, scale: f64) -> Result<Vec<u8>> {
    let img = image::load_from_memory_with_format(png, ImageFormat::Png)?;
    let (width, height) = img.dimensions();

    let scale = if scale > 0.0 { scale } else { 1.0 };
    let left = (bbox.x * scale).floor().clamp(0.0, width as f64) as u32;
    let top = (bbox.y * scale).floor().clamp(0.0, height as f64) as u32;
    let right = ((bbox.x + bbox.width) * scale).ceil().clamp(0.0, width as f64) as u32;
    let bottom = ((bbox.y + bbox.height) * scale).ceil().clamp(0.0, height as f64) as u32;

    if right <= left || bottom <= top {
        return Err(Error::Evidence(format!(
            "element box {:?} is outside the {}x{} viewport",
            bbox, width, height
        )));
    }

    let cropped = img.crop_imm(left, top, right - left, bottom - top);
    let mut out = Vec::new();
    cropped.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}
