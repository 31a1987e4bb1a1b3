//! Pagination of a tall raster into page-sized slices.

use image::{imageops, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rendering::RasterBuffer;

const MM_PER_INCH: f64 = 25.4;
const PT_PER_INCH: f64 = 72.0;

/// Physical page size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFormat {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageFormat {
    pub const A4: PageFormat = PageFormat {
        width_mm: 210.0,
        height_mm: 297.0,
    };

    pub fn width_pt(&self) -> f64 {
        mm_to_pt(self.width_mm)
    }

    pub fn height_pt(&self) -> f64 {
        mm_to_pt(self.height_mm)
    }

    fn validate(&self) -> Result<()> {
        if self.width_mm > 0.0 && self.height_mm > 0.0 {
            Ok(())
        } else {
            Err(Error::ConfigError(format!(
                "page format {}x{} mm is empty",
                self.width_mm, self.height_mm
            )))
        }
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::A4
    }
}

pub fn mm_to_pt(mm: f64) -> f64 {
    mm * PT_PER_INCH / MM_PER_INCH
}

/// Rows `[source_y, source_y + source_height)` of the raster that go on page
/// `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub index: usize,
    pub source_y: u32,
    pub source_height: u32,
}

/// One page worth of pixels.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub index: usize,
    pub source_y: u32,
    pub image: RgbImage,
    /// Height the slice occupies on the page when stretched to full width.
    pub height_mm: f64,
}

/// Split a `width` x `height` raster into page windows.
///
/// The raster is scaled to the page width. If it then fits the page height
/// it becomes a single page; otherwise each page takes
/// `height_mm * height / img_height_mm` rows. Window edges are rounded once
/// from their exact positions, so consecutive windows share an edge and the
/// windows always add up to `height`.
///
/// A last window that rounds to zero rows is not emitted, so a sub-pixel
/// remainder yields `ceil(img_height_mm / page_height_mm) - 1` pages rather
/// than a trailing blank one.
pub fn plan_windows(height: u32, width: u32, format: PageFormat) -> Result<Vec<PageWindow>> {
    format.validate()?;
    if height == 0 || width == 0 {
        return Err(Error::AssemblyFailure(format!(
            "cannot paginate an empty {width}x{height} raster"
        )));
    }

    let h = height as f64;
    let img_height_mm = h * format.width_mm / width as f64;
    if img_height_mm <= format.height_mm {
        return Ok(vec![PageWindow {
            index: 0,
            source_y: 0,
            source_height: height,
        }]);
    }

    let page_px = format.height_mm * h / img_height_mm;
    let edge = |page: usize| ((page as f64 * page_px).round() as u32).min(height);

    let mut windows = Vec::new();
    let mut page = 0usize;
    while img_height_mm - page as f64 * format.height_mm > 0.0 {
        let (start, end) = (edge(page), edge(page + 1));
        if start >= height {
            break;
        }
        if end > start {
            windows.push(PageWindow {
                index: windows.len(),
                source_y: start,
                source_height: end - start,
            });
        }
        page += 1;
    }
    Ok(windows)
}

/// Cut `buffer` into page images, each on a fresh white canvas.
pub fn slice(buffer: &RasterBuffer, format: PageFormat) -> Result<Vec<PageImage>> {
    let (width, height) = (buffer.width(), buffer.height());
    let windows = plan_windows(height, width, format)?;
    let pages = windows
        .iter()
        .map(|w| {
            let mut page = RgbImage::from_pixel(width, w.source_height, Rgb([255, 255, 255]));
            let rows = imageops::crop_imm(buffer.image(), 0, w.source_y, width, w.source_height).to_image();
            imageops::replace(&mut page, &rows, 0, 0);
            PageImage {
                index: w.index,
                source_y: w.source_y,
                image: page,
                height_mm: w.source_height as f64 * format.width_mm / width as f64,
            }
        })
        .collect();
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(windows: &[PageWindow], height: u32) {
        assert_eq!(windows[0].source_y, 0);
        for pair in windows.windows(2) {
            assert_eq!(pair[1].source_y, pair[0].source_y + pair[0].source_height);
            assert_eq!(pair[1].index, pair[0].index + 1);
        }
        let total: u32 = windows.iter().map(|w| w.source_height).sum();
        assert_eq!(total, height);
    }

    #[test]
    fn windows_cover_the_raster_exactly() {
        for height in [100, 1123, 2500, 3000] {
            let windows = plan_windows(height, 794, PageFormat::A4).unwrap();
            assert_contiguous(&windows, height);
        }
        // awkward widths and formats
        for (h, w) in [(10_001, 333), (7, 1), (99_999, 2382), (3369, 794)] {
            let windows = plan_windows(h, w, PageFormat { width_mm: 215.9, height_mm: 279.4 }).unwrap();
            assert_contiguous(&windows, h);
        }
    }

    #[test]
    fn short_rasters_are_a_single_page() {
        let windows = plan_windows(1123, 794, PageFormat::A4).unwrap();
        assert_eq!(windows, vec![PageWindow { index: 0, source_y: 0, source_height: 1123 }]);
    }

    #[test]
    fn three_pages_with_remainder() {
        let windows = plan_windows(2500, 794, PageFormat::A4).unwrap();
        let heights: Vec<u32> = windows.iter().map(|w| w.source_height).collect();
        assert_eq!(heights, vec![1123, 1123, 254]);
    }

    #[test]
    fn page_count_is_ceil_of_scaled_height() {
        for height in [1124, 2247, 5000, 33_690] {
            let windows = plan_windows(height, 794, PageFormat::A4).unwrap();
            let img_mm = height as f64 * 210.0 / 794.0;
            assert_eq!(windows.len(), (img_mm / 297.0).ceil() as usize, "H={height}");
        }
    }

    #[test]
    fn sub_pixel_remainders_add_no_blank_page() {
        // 2246 rows scale to 594.03 mm; the last 0.03 mm rounds to no rows
        let windows = plan_windows(2246, 794, PageFormat::A4).unwrap();
        assert_eq!(windows.len(), 2);
        assert_contiguous(&windows, 2246);
    }

    #[test]
    fn empty_rasters_fail() {
        assert!(matches!(plan_windows(0, 794, PageFormat::A4), Err(Error::AssemblyFailure(_))));
        assert!(matches!(
            plan_windows(10, 10, PageFormat { width_mm: 0.0, height_mm: 297.0 }),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn slices_copy_the_right_rows() {
        let mut img = RgbImage::from_pixel(794, 2500, Rgb([255, 255, 255]));
        for x in 0..794 {
            img.put_pixel(x, 1123, Rgb([1, 2, 3]));
            img.put_pixel(x, 2499, Rgb([4, 5, 6]));
        }
        let pages = slice(&RasterBuffer::new(img), PageFormat::A4).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].image.get_pixel(0, 0).0, [1, 2, 3]);
        assert_eq!(pages[2].image.get_pixel(10, 253).0, [4, 5, 6]);
        assert!((pages[0].height_mm - 297.0).abs() < 0.1);
        assert!(pages[2].height_mm < 297.0);
    }
}
