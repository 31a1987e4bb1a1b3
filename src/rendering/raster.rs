//! tiny-skia backed [`Rasterizer`].

use std::collections::HashMap;
use std::time::Instant;

use image::RgbImage;
use log::{debug, warn};
use tiny_skia::{FilterQuality, Paint, Pixmap, PixmapPaint, Transform};

use super::images::load_image;
use super::layout::{self, Rect, ADVANCE_EM};
use super::paint::{build_display_list, PaintCommand};
use super::{RasterBuffer, RasterOptions, Rasterizer};
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::style::StyleResolver;

/// Paints the box tree of a subtree onto an opaque white canvas.
///
/// Text is drawn as one solid block per glyph, so captures are deterministic
/// and need no fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixmapRasterizer;

impl PixmapRasterizer {
    pub fn new() -> Self {
        Self
    }
}

fn to_skia(rect: &Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
}

fn fill(pixmap: &mut Pixmap, rect: &Rect, rgba: [u8; 4], ts: Transform) {
    let Some(r) = to_skia(rect) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint.anti_alias = false;
    pixmap.fill_rect(r, &paint, ts, None);
}

/// One block per non-whitespace glyph, inset inside its advance cell.
fn draw_text(pixmap: &mut Pixmap, rect: &Rect, text: &str, font_size: f32, rgba: [u8; 4], ts: Transform) {
    let adv = font_size * ADVANCE_EM;
    let top = rect.y + (rect.height - font_size) / 2.0 + 0.2 * font_size;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let glyph = Rect {
            x: rect.x + i as f32 * adv + 0.1 * adv,
            y: top,
            width: 0.8 * adv,
            height: 0.7 * font_size,
        };
        fill(pixmap, &glyph, rgba, ts);
    }
}

fn draw_image(pixmap: &mut Pixmap, image: &Pixmap, rect: &Rect, ts: Transform) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if w <= 0.0 || h <= 0.0 || rect.width <= 0.0 || rect.height <= 0.0 {
        return;
    }
    let placement = Transform::from_row(rect.width / w, 0.0, 0.0, rect.height / h, rect.x, rect.y);
    let mut paint = PixmapPaint::default();
    paint.quality = FilterQuality::Bilinear;
    pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, ts.pre_concat(placement), None);
}

impl Rasterizer for PixmapRasterizer {
    fn rasterize(&self, doc: &Document, root: NodeId, options: &RasterOptions) -> Result<RasterBuffer> {
        let started = Instant::now();
        let deadline = options.deadline(started);
        if !doc.is_element(root) {
            return Err(Error::RasterizationFailure(format!("{root:?} is not an element")));
        }
        if options.scale.is_nan() || options.scale <= 0.0 {
            return Err(Error::RasterizationFailure(format!("invalid scale {}", options.scale)));
        }

        let resolver = StyleResolver::new(doc);
        let tree = layout::layout_tree(doc, &resolver, root, options.width_px as f32);
        deadline.check()?;

        let css_height = (options.min_height_px as f32).max(layout::scroll_height(&tree).ceil());
        let width_px = (options.width_px as f32 * options.scale).round() as u32;
        let height_px = (css_height * options.scale).round() as u32;
        let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
            Error::RasterizationFailure(format!(
                "invalid raster size {}x{} at scale {}",
                width_px, height_px, options.scale
            ))
        })?;
        pixmap.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));

        let ts = Transform::from_scale(options.scale, options.scale);
        let list = build_display_list(&tree);
        debug!(
            "rasterizing {} paint commands into {}x{}",
            list.len(),
            width_px,
            height_px
        );

        let mut cache: HashMap<String, Option<Pixmap>> = HashMap::new();
        for cmd in &list {
            deadline.check()?;
            match cmd {
                PaintCommand::SolidRect { rect, rgba } => fill(&mut pixmap, rect, *rgba, ts),
                PaintCommand::Text { rect, text, font_size, rgba } => {
                    draw_text(&mut pixmap, rect, text, *font_size, *rgba, ts)
                }
                PaintCommand::Image { rect, src } => {
                    let loaded = cache.entry(src.clone()).or_insert_with(|| {
                        load_image(src, options)
                            .map_err(|e| warn!("image {} left blank: {}", short(src), e))
                            .ok()
                    });
                    if let Some(image) = loaded {
                        draw_image(&mut pixmap, image, rect, ts);
                    }
                }
            }
        }

        // the canvas is opaque, so premultiplied channels are the plain ones
        let rgb: Vec<u8> = pixmap
            .data()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        let image = RgbImage::from_raw(width_px, height_px, rgb)
            .ok_or_else(|| Error::RasterizationFailure("pixel buffer size mismatch".into()))?;
        Ok(RasterBuffer::new(image))
    }
}

fn short(src: &str) -> &str {
    match src.char_indices().nth(64) {
        Some((i, _)) => &src[..i],
        None => src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::images::png_data_uri;

    fn opts(scale: f32) -> RasterOptions {
        RasterOptions {
            width_px: 100,
            min_height_px: 50,
            scale,
            ..Default::default()
        }
    }

    fn raster(html: &str, scale: f32) -> RasterBuffer {
        let doc = Document::parse(html);
        let root = doc.get_element_by_id("r").unwrap();
        PixmapRasterizer::new().rasterize(&doc, root, &opts(scale)).unwrap()
    }

    #[test]
    fn output_size_follows_scale_and_min_height() {
        let buf = raster(r#"<div id="r" style="height: 20px"></div>"#, 2.0);
        assert_eq!((buf.width(), buf.height()), (200, 100));
        let tall = raster(r#"<div id="r" style="height: 80px"></div>"#, 1.0);
        assert_eq!(tall.height(), 80);
    }

    #[test]
    fn backgrounds_and_glyphs_are_painted() {
        let buf = raster(
            r#"<div id="r" style="background-color: rgb(0, 0, 255); color: rgb(255, 0, 0); line-height: 20px; font-size: 20px">W</div>"#,
            1.0,
        );
        assert_eq!(buf.pixel(50, 10), Some([0, 0, 255]));
        // glyph cell: x 1..9, y 4..18
        assert_eq!(buf.pixel(5, 10), Some([255, 0, 0]));
        // below the box stays white
        assert_eq!(buf.pixel(50, 40), Some([255, 255, 255]));
    }

    #[test]
    fn unsupported_colors_are_not_painted() {
        let buf = raster(
            r#"<div id="r" style="height: 30px; background-color: oklch(0.5 0.2 20)"></div>"#,
            1.0,
        );
        assert_eq!(buf.pixel(10, 10), Some([255, 255, 255]));
    }

    #[test]
    fn data_uri_images_are_drawn() {
        let src = png_data_uri(2, 2, [0, 200, 0]);
        let buf = raster(
            &format!(r#"<div id="r"><img src="{src}" width="20" height="20"></div>"#),
            1.0,
        );
        assert_eq!(buf.pixel(10, 10), Some([0, 200, 0]));
    }

    #[test]
    fn broken_images_leave_their_box_blank() {
        let buf = raster(
            r#"<div id="r"><img src="data:image/png;base64,AAAA" width="20" height="20"></div>"#,
            1.0,
        );
        assert_eq!(buf.pixel(10, 10), Some([255, 255, 255]));
    }

    #[test]
    fn zero_scale_is_rejected() {
        let doc = Document::parse(r#"<div id="r"></div>"#);
        let root = doc.get_element_by_id("r").unwrap();
        let err = PixmapRasterizer::new().rasterize(&doc, root, &opts(0.0)).unwrap_err();
        assert!(matches!(err, Error::RasterizationFailure(_)));
    }
}
