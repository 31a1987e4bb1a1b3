//! Rasterization of a flattened clone into an RGB bitmap.
//!
//! The [`Rasterizer`] trait is the seam the exporter talks to; the bundled
//! [`PixmapRasterizer`] lays the clone out (`layout`), turns the boxes into
//! a display list (`paint`) and draws it with tiny-skia (`raster`).

pub mod images;
pub mod layout;
pub mod paint;
pub mod raster;

use std::time::{Duration, Instant};

use image::RgbImage;
use sha2::{Digest, Sha256};
use url::Url;

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};

pub use raster::PixmapRasterizer;

/// Capture parameters for one rasterization.
#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Layout viewport width in CSS px.
    pub width_px: u32,
    /// The captured height is never less than this.
    pub min_height_px: u32,
    /// Device pixels per CSS px.
    pub scale: f32,
    /// Load images from origins other than `origin`.
    pub allow_cross_origin: bool,
    /// Per-image fetch timeout. `None` waits indefinitely.
    pub image_timeout: Option<Duration>,
    /// Budget for the whole rasterization. `None` is unbounded.
    pub timeout: Option<Duration>,
    /// Base URL that relative image sources resolve against.
    pub origin: Option<Url>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            width_px: 794,
            min_height_px: 1123,
            scale: 3.0,
            allow_cross_origin: true,
            image_timeout: None,
            timeout: None,
            origin: None,
        }
    }
}

impl RasterOptions {
    pub(crate) fn deadline(&self, started: Instant) -> Deadline {
        Deadline {
            at: self.timeout.map(|t| started + t),
            budget_ms: self.timeout.map_or(0, |t| t.as_millis() as u64),
        }
    }
}

/// Cooperative deadline, checked between units of work.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Option<Instant>,
    budget_ms: u64,
}

impl Deadline {
    pub(crate) fn check(&self) -> Result<()> {
        match self.at {
            Some(at) if Instant::now() > at => Err(Error::Timeout(self.budget_ms)),
            _ => Ok(()),
        }
    }
}

/// Opaque RGB capture of a node tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBuffer {
    image: RgbImage,
}

impl RasterBuffer {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// A white buffer of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        (x < self.width() && y < self.height()).then(|| self.image.get_pixel(x, y).0)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// SHA-256 of the dimensions and pixel data, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width().to_le_bytes());
        hasher.update(self.height().to_le_bytes());
        hasher.update(self.image.as_raw());
        hex::encode(hasher.finalize())
    }
}

/// Produces a bitmap of an attached subtree.
pub trait Rasterizer {
    fn rasterize(&self, doc: &Document, root: NodeId, options: &RasterOptions) -> Result<RasterBuffer>;
}

impl<R: Rasterizer + ?Sized> Rasterizer for &R {
    fn rasterize(&self, doc: &Document, root: NodeId, options: &RasterOptions) -> Result<RasterBuffer> {
        (**self).rasterize(doc, root, options)
    }
}

impl<R: Rasterizer + ?Sized> Rasterizer for Box<R> {
    fn rasterize(&self, doc: &Document, root: NodeId, options: &RasterOptions) -> Result<RasterBuffer> {
        (**self).rasterize(doc, root, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_depends_on_pixels_and_shape() {
        let a = RasterBuffer::blank(4, 2);
        let b = RasterBuffer::blank(2, 4);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), RasterBuffer::blank(4, 2).fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert_eq!(a.pixel(3, 1), Some([255, 255, 255]));
        assert_eq!(a.pixel(4, 0), None);
    }

    #[test]
    fn deadline_without_timeout_never_fires() {
        let opts = RasterOptions::default();
        assert!(opts.deadline(Instant::now()).check().is_ok());

        let opts = RasterOptions {
            timeout: Some(Duration::from_millis(0)),
            ..Default::default()
        };
        let d = opts.deadline(Instant::now() - Duration::from_millis(5));
        assert!(matches!(d.check(), Err(Error::Timeout(0))));
    }
}
