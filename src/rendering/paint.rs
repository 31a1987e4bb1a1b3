//! Display list built from a layout tree.

use super::layout::{LayoutKind, LayoutNode, Rect};
use crate::safety::is_unsupported;

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        rect: Rect,
        rgba: [u8; 4],
    },
    Text {
        rect: Rect,
        text: String,
        font_size: f32,
        rgba: [u8; 4],
    },
    Image {
        rect: Rect,
        src: String,
    },
}

/// Paintable RGBA for a computed color. Fully transparent colors and colors
/// the rasterizer cannot read yield `None`.
pub fn parse_color(value: &str) -> Option<[u8; 4]> {
    if value.is_empty() || is_unsupported(value) {
        return None;
    }
    let rgba = csscolorparser::parse(value).ok()?.to_rgba8();
    (rgba[3] > 0).then_some(rgba)
}

fn border_rects(node: &LayoutNode) -> Vec<(Rect, &'static str)> {
    let r = node.lb.rect;
    let b = node.lb.box_model.border;
    let mut out = Vec::new();
    if b.top > 0.0 {
        out.push((Rect { height: b.top, ..r }, "border-top-color"));
    }
    if b.bottom > 0.0 {
        out.push((Rect { y: r.bottom() - b.bottom, height: b.bottom, ..r }, "border-bottom-color"));
    }
    if b.left > 0.0 {
        out.push((Rect { width: b.left, ..r }, "border-left-color"));
    }
    if b.right > 0.0 {
        out.push((Rect { x: r.right() - b.right, width: b.right, ..r }, "border-right-color"));
    }
    out
}

/// Paint order: background, borders, then content, depth first.
pub fn build_display_list(root: &LayoutNode) -> Vec<PaintCommand> {
    let mut out = Vec::new();
    paint_node(root, &mut out);
    out
}

fn paint_node(node: &LayoutNode, out: &mut Vec<PaintCommand>) {
    if node.visible() {
        if let Some(rgba) = node.style.value("background-color").and_then(parse_color) {
            out.push(PaintCommand::SolidRect { rect: node.lb.rect, rgba });
        }
        for (rect, prop) in border_rects(node) {
            if let Some(rgba) = node.style.value(prop).and_then(parse_color) {
                out.push(PaintCommand::SolidRect { rect, rgba });
            }
        }
        if let LayoutKind::Image { src } = &node.kind {
            if !src.is_empty() {
                out.push(PaintCommand::Image {
                    rect: node.lb.content_box(),
                    src: src.clone(),
                });
            }
        }
    }

    for child in &node.children {
        paint_node(child, out);
    }

    for run in node.text.iter().filter(|r| r.visible) {
        if let Some(rgba) = run.background.as_deref().and_then(parse_color) {
            out.push(PaintCommand::SolidRect { rect: run.rect, rgba });
        }
        if let Some(rgba) = parse_color(&run.color) {
            out.push(PaintCommand::Text {
                rect: run.rect,
                text: run.text.clone(),
                font_size: run.font_size,
                rgba,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::rendering::layout::layout_tree;
    use crate::style::StyleResolver;

    #[test]
    fn parse_color_skips_transparent_and_unsupported() {
        assert_eq!(parse_color("rgb(255, 0, 0)"), Some([255, 0, 0, 255]));
        assert_eq!(parse_color("rgba(0, 0, 0, 0)"), None);
        assert_eq!(parse_color("oklch(0.5 0.1 200)"), None);
        assert_eq!(parse_color(""), None);
    }

    #[test]
    fn background_borders_then_text() {
        let doc = Document::parse(
            r#"<div id="r" style="background-color: #eee; border-top: 2px solid red; color: blue">hi</div>"#,
        );
        let root = doc.get_element_by_id("r").unwrap();
        let resolver = StyleResolver::new(&doc);
        let tree = layout_tree(&doc, &resolver, root, 100.0);
        let list = build_display_list(&tree);

        assert!(matches!(list[0], PaintCommand::SolidRect { rgba: [238, 238, 238, 255], .. }));
        match &list[1] {
            PaintCommand::SolidRect { rect, rgba } => {
                assert_eq!(*rgba, [255, 0, 0, 255]);
                assert_eq!(rect.height, 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        match list.last() {
            Some(PaintCommand::Text { text, rgba, .. }) => {
                assert_eq!(text, "hi");
                assert_eq!(*rgba, [0, 0, 255, 255]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn hidden_boxes_paint_nothing() {
        let doc = Document::parse(
            r#"<div id="r" style="visibility: hidden; background-color: red">x</div>"#,
        );
        let root = doc.get_element_by_id("r").unwrap();
        let resolver = StyleResolver::new(&doc);
        let tree = layout_tree(&doc, &resolver, root, 100.0);
        assert!(build_display_list(&tree).is_empty());
    }
}
