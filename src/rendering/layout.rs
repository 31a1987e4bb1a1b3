//! Box layout for flattened trees.
//!
//! Deliberately small: block flow without margin collapsing, horizontal rows
//! for `table-row` and row flex containers, and inline text broken into lines
//! with fixed advance metrics (every glyph is half an em wide).

use std::rc::Rc;

use crate::dom::{Document, NodeId, NodeKind};
use crate::style::{ComputedStyle, StyleResolver};

/// Glyph advance as a fraction of the font size.
pub const ADVANCE_EM: f32 = 0.5;
const DEFAULT_IMAGE_PX: f32 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    fn inset(&self, e: &Edges) -> Rect {
        Rect {
            x: self.x + e.left,
            y: self.y + e.top,
            width: (self.width - e.horizontal()).max(0.0),
            height: (self.height - e.vertical()).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxModel {
    pub margin: Edges,
    pub border: Edges,
    pub padding: Edges,
}

/// Border box plus the edges around it.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    pub fn padding_box(&self) -> Rect {
        self.rect.inset(&self.box_model.border)
    }

    pub fn content_box(&self) -> Rect {
        self.padding_box().inset(&self.box_model.padding)
    }
}

/// One word (or other unbreakable piece of text) placed on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub rect: Rect,
    pub text: String,
    pub font_size: f32,
    pub color: String,
    /// Background of the inline element that owns the text, if any.
    pub background: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutKind {
    Block,
    Row,
    Image { src: String },
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub node: NodeId,
    pub lb: LayoutBox,
    pub style: Rc<ComputedStyle>,
    pub kind: LayoutKind,
    pub children: Vec<LayoutNode>,
    pub text: Vec<TextRun>,
}

impl LayoutNode {
    /// Lowest edge of this box or anything inside it.
    pub fn content_bottom(&self) -> f32 {
        let own = self.lb.rect.bottom();
        let kids = self.children.iter().map(LayoutNode::content_bottom);
        let runs = self.text.iter().map(|r| r.rect.bottom());
        kids.chain(runs).fold(own, f32::max)
    }

    pub fn visible(&self) -> bool {
        !matches!(self.style.value("visibility"), Some("hidden") | Some("collapse"))
    }
}

/// Lay out `root` with its border box at the origin, `width` px wide unless
/// its own style says otherwise.
pub fn layout_tree(doc: &Document, resolver: &StyleResolver<'_>, root: NodeId, width: f32) -> LayoutNode {
    let style = resolver.computed_style(root);
    let m = box_model(&style, width).margin;
    let ctx = Ctx { doc, resolver };
    ctx.layout_block(root, -m.left, -m.top, width + m.horizontal())
}

/// Height a capture of `tree` needs to show everything.
pub fn scroll_height(tree: &LayoutNode) -> f32 {
    tree.content_bottom().max(0.0)
}

fn resolve(value: Option<&str>, basis: f32) -> Option<f32> {
    let v = value?.trim();
    if let Some(px) = v.strip_suffix("px") {
        return px.trim().parse().ok();
    }
    if let Some(pct) = v.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|p| p / 100.0 * basis);
    }
    (v == "0").then_some(0.0)
}

fn edges(style: &ComputedStyle, prefix: &str, suffix: &str, basis: f32) -> Edges {
    let get = |side: &str| resolve(style.value(&format!("{prefix}-{side}{suffix}")), basis).unwrap_or(0.0);
    Edges {
        top: get("top"),
        right: get("right"),
        bottom: get("bottom"),
        left: get("left"),
    }
}

fn box_model(style: &ComputedStyle, containing_width: f32) -> BoxModel {
    BoxModel {
        margin: edges(style, "margin", "", containing_width),
        border: edges(style, "border", "-width", containing_width),
        padding: edges(style, "padding", "", containing_width),
    }
}

fn display(style: &ComputedStyle) -> &str {
    style.value("display").unwrap_or("inline")
}

fn is_block_level(style: &ComputedStyle) -> bool {
    !matches!(display(style), "inline" | "inline-block" | "inline-flex" | "contents")
}

fn is_row(style: &ComputedStyle) -> bool {
    match display(style) {
        "table-row" => true,
        "flex" | "inline-flex" => !style
            .value("flex-direction")
            .map_or(false, |d| d.starts_with("column")),
        _ => false,
    }
}

fn line_height(style: &ComputedStyle) -> f32 {
    let fs = style.font_size_px();
    let v = style.value("line-height").unwrap_or("normal");
    if let Some(px) = resolve(Some(v), fs) {
        return px;
    }
    v.parse::<f32>().map(|n| n * fs).unwrap_or(fs * 1.2)
}

fn is_transparent(color: &str) -> bool {
    color == "transparent" || (color.starts_with("rgba(") && color.ends_with(", 0)"))
}

enum Piece {
    Word { text: String, style: Rc<ComputedStyle>, background: Option<String> },
    Space { width: f32 },
    Image { node: NodeId, style: Rc<ComputedStyle>, width: f32, height: f32 },
    Break,
}

struct Ctx<'d, 'r> {
    doc: &'d Document,
    resolver: &'r StyleResolver<'d>,
}

impl<'d, 'r> Ctx<'d, 'r> {
    fn style(&self, node: NodeId) -> Rc<ComputedStyle> {
        self.resolver.computed_style(node)
    }

    fn displayed(&self, node: NodeId) -> bool {
        match self.doc.kind(node) {
            Some(NodeKind::Element(_)) => display(&self.style(node)) != "none",
            Some(NodeKind::Text(_)) => true,
            _ => false,
        }
    }

    fn block_level(&self, node: NodeId) -> bool {
        self.doc.is_element(node)
            && self.doc.tag_name(node) != Some("br")
            && is_block_level(&self.style(node))
    }

    fn image_size(&self, node: NodeId, style: &ComputedStyle, basis: f32) -> (f32, f32) {
        let attr = |name: &str| self.doc.attribute(node, name).and_then(|v| v.trim().parse::<f32>().ok());
        let w = resolve(style.value("width"), basis).or_else(|| attr("width"));
        let h = resolve(style.value("height"), basis).or_else(|| attr("height"));
        match (w, h) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w),
            (None, Some(h)) => (h, h),
            (None, None) => (DEFAULT_IMAGE_PX, DEFAULT_IMAGE_PX),
        }
    }

    fn border_box_width(&self, style: &ComputedStyle, bm: &BoxModel, avail: f32) -> f32 {
        let extra = bm.border.horizontal() + bm.padding.horizontal();
        let border_box = style.value("box-sizing") == Some("border-box");
        let to_border_box = |w: f32| if border_box { w.max(extra) } else { w + extra };

        let mut width = match resolve(style.value("width"), avail) {
            Some(w) => to_border_box(w),
            None => avail - bm.margin.horizontal(),
        };
        if let Some(max) = resolve(style.value("max-width"), avail) {
            width = width.min(to_border_box(max));
        }
        if let Some(min) = resolve(style.value("min-width"), avail) {
            width = width.max(to_border_box(min));
        }
        width.max(extra)
    }

    /// Lay out an element whose margin box starts at `(x, y)` inside a
    /// containing block `avail` px wide.
    fn layout_block(&self, node: NodeId, x: f32, y: f32, avail: f32) -> LayoutNode {
        let style = self.style(node);
        let mut bm = box_model(&style, avail);
        let is_img = self.doc.tag_name(node) == Some("img");
        let mut width = self.border_box_width(&style, &bm, avail);
        if is_img && resolve(style.value("width"), avail).is_none() {
            let (w, _) = self.image_size(node, &style, avail);
            width = w + bm.border.horizontal() + bm.padding.horizontal();
        }

        // `margin: 0 auto` centring
        let auto = |side: &str| style.value(&format!("margin-{side}")) == Some("auto");
        if auto("left") && auto("right") && resolve(style.value("width"), avail).is_some() {
            let free = (avail - width).max(0.0) / 2.0;
            bm.margin.left = free;
            bm.margin.right = free;
        }

        let rect = Rect {
            x: x + bm.margin.left,
            y: y + bm.margin.top,
            width,
            height: 0.0,
        };
        let mut lb = LayoutBox { rect, box_model: bm };
        let content = lb.content_box();

        let (kind, children, text, content_height) = if is_img {
            let (_, h) = self.image_size(node, &style, avail);
            let src = self.doc.attribute(node, "src").unwrap_or_default();
            (LayoutKind::Image { src }, Vec::new(), Vec::new(), h)
        } else if is_row(&style) {
            let (children, text, h) = self.layout_row(node, &style, content);
            (LayoutKind::Row, children, text, h)
        } else {
            let (children, text, h) = self.layout_flow(node, &style, content);
            (LayoutKind::Block, children, text, h)
        };

        let vertical = bm.border.vertical() + bm.padding.vertical();
        let border_box = style.value("box-sizing") == Some("border-box");
        let mut height = match style.px("height") {
            Some(h) if border_box => h.max(vertical),
            Some(h) => h + vertical,
            None => content_height + vertical,
        };
        if let Some(min) = style.px("min-height") {
            height = height.max(if border_box { min } else { min + vertical });
        }
        lb.rect.height = height;

        LayoutNode {
            node,
            lb,
            style,
            kind,
            children,
            text,
        }
    }

    /// Block flow: block-level children stack, runs of inline-level
    /// children become line boxes.
    fn layout_flow(&self, node: NodeId, style: &ComputedStyle, content: Rect) -> (Vec<LayoutNode>, Vec<TextRun>, f32) {
        let mut children = Vec::new();
        let mut text = Vec::new();
        let mut cursor = content.y;
        let mut run: Vec<NodeId> = Vec::new();

        let kids: Vec<NodeId> = self
            .doc
            .children(node)
            .iter()
            .copied()
            .filter(|&c| self.displayed(c))
            .collect();
        for (i, &child) in kids.iter().enumerate() {
            let block = self.block_level(child);
            if !block {
                run.push(child);
            }
            if (block || i + 1 == kids.len()) && !run.is_empty() {
                let (imgs, runs, h) = self.layout_inline(&run, style, content.x, cursor, content.width);
                children.extend(imgs);
                text.extend(runs);
                cursor += h;
                run.clear();
            }
            if block {
                let laid = self.layout_block(child, content.x, cursor, content.width);
                cursor = laid.lb.rect.bottom() + laid.lb.box_model.margin.bottom;
                children.push(laid);
            }
        }
        (children, text, cursor - content.y)
    }

    /// Horizontal row: fixed-width cells keep their width, the rest share
    /// what is left equally. Cells stretch to the row height.
    fn layout_row(&self, node: NodeId, style: &ComputedStyle, content: Rect) -> (Vec<LayoutNode>, Vec<TextRun>, f32) {
        let cells: Vec<NodeId> = self
            .doc
            .children(node)
            .iter()
            .copied()
            .filter(|&c| self.displayed(c))
            .filter(|&c| self.doc.is_element(c) || self.doc.text(c).map_or(false, |t| !t.trim().is_empty()))
            .collect();
        if cells.is_empty() {
            return (Vec::new(), Vec::new(), 0.0);
        }

        let fixed: Vec<Option<f32>> = cells
            .iter()
            .map(|&c| {
                if !self.doc.is_element(c) {
                    return None;
                }
                let s = self.style(c);
                let bm = box_model(&s, content.width);
                resolve(s.value("width"), content.width)
                    .map(|_| self.border_box_width(&s, &bm, content.width) + bm.margin.horizontal())
            })
            .collect();
        let used: f32 = fixed.iter().flatten().sum();
        let autos = fixed.iter().filter(|f| f.is_none()).count().max(1) as f32;
        let share = ((content.width - used) / autos).max(0.0);

        let mut children = Vec::new();
        let mut text = Vec::new();
        let mut x = content.x;
        let mut row_height: f32 = 0.0;
        for (&cell, width) in cells.iter().zip(&fixed) {
            let w = width.unwrap_or(share);
            if self.doc.is_element(cell) {
                let laid = self.layout_block(cell, x, content.y, w);
                row_height = row_height.max(laid.lb.rect.height + laid.lb.box_model.margin.vertical());
                children.push(laid);
            } else {
                let (imgs, runs, h) = self.layout_inline(&[cell], style, x, content.y, w);
                children.extend(imgs);
                text.extend(runs);
                row_height = row_height.max(h);
            }
            x += w;
        }

        for child in children.iter_mut().filter(|c| !matches!(c.kind, LayoutKind::Image { .. })) {
            if child.style.value("height") == Some("auto") {
                child.lb.rect.height = (row_height - child.lb.box_model.margin.vertical()).max(child.lb.rect.height);
            }
        }
        (children, text, row_height)
    }

    fn collect_pieces(&self, node: NodeId, inherited_bg: Option<&str>, out: &mut Vec<Piece>) {
        match self.doc.kind(node) {
            Some(NodeKind::Text(t)) => {
                let style = self.style(node);
                let adv = style.font_size_px() * ADVANCE_EM;
                let upper = style.value("text-transform") == Some("uppercase");
                for (i, part) in t.split(char::is_whitespace).enumerate() {
                    if i > 0 && !matches!(out.last(), Some(Piece::Space { .. }) | None) {
                        out.push(Piece::Space { width: adv });
                    }
                    if part.is_empty() {
                        continue;
                    }
                    let text = if upper { part.to_uppercase() } else { part.to_string() };
                    out.push(Piece::Word {
                        text,
                        style: Rc::clone(&style),
                        background: inherited_bg.map(str::to_string),
                    });
                }
            }
            Some(NodeKind::Element(_)) => {
                let style = self.style(node);
                if display(&style) == "none" {
                    return;
                }
                match self.doc.tag_name(node) {
                    Some("br") => out.push(Piece::Break),
                    Some("img") => {
                        let (width, height) = self.image_size(node, &style, 0.0);
                        out.push(Piece::Image { node, style, width, height });
                    }
                    _ => {
                        let own_bg = style
                            .value("background-color")
                            .filter(|c| !is_transparent(c))
                            .map(str::to_string);
                        let bg = own_bg.as_deref().or(inherited_bg);
                        for &c in self.doc.children(node) {
                            self.collect_pieces(c, bg, out);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Break inline content into lines. Returns image boxes, text runs and
    /// the total height of the line boxes.
    fn layout_inline(
        &self,
        nodes: &[NodeId],
        block_style: &ComputedStyle,
        x0: f32,
        y0: f32,
        width: f32,
    ) -> (Vec<LayoutNode>, Vec<TextRun>, f32) {
        let mut pieces = Vec::new();
        for &n in nodes {
            self.collect_pieces(n, None, &mut pieces);
        }
        if !pieces.iter().any(|p| matches!(p, Piece::Word { .. } | Piece::Image { .. })) {
            return (Vec::new(), Vec::new(), 0.0);
        }

        // (piece index, x offset) per line
        let mut lines: Vec<Vec<(usize, f32)>> = vec![Vec::new()];
        let mut x = 0.0f32;
        let mut pending_space = 0.0f32;
        for (i, piece) in pieces.iter().enumerate() {
            let w = match piece {
                Piece::Word { text, style, .. } => text.chars().count() as f32 * style.font_size_px() * ADVANCE_EM,
                Piece::Image { width, .. } => *width,
                Piece::Space { width } => {
                    if x > 0.0 {
                        pending_space = *width;
                    }
                    continue;
                }
                Piece::Break => {
                    lines.push(Vec::new());
                    x = 0.0;
                    pending_space = 0.0;
                    continue;
                }
            };
            let line_empty = lines.last().map_or(true, Vec::is_empty);
            if !line_empty && x + pending_space + w > width {
                lines.push(Vec::new());
                x = 0.0;
                pending_space = 0.0;
            }
            let at = x + pending_space;
            if let Some(line) = lines.last_mut() {
                line.push((i, at));
            }
            x = at + w;
            pending_space = 0.0;
        }

        let base_line = line_height(block_style);
        let align = block_style.value("text-align").unwrap_or("start");
        let mut images = Vec::new();
        let mut runs = Vec::new();
        let mut y = y0;
        for line in &lines {
            let mut line_h: f32 = if line.is_empty() { base_line } else { 0.0 };
            let mut line_w: f32 = 0.0;
            for &(i, at) in line {
                let (h, w) = match &pieces[i] {
                    Piece::Word { text, style, .. } => (
                        line_height(style),
                        text.chars().count() as f32 * style.font_size_px() * ADVANCE_EM,
                    ),
                    Piece::Image { width, height, .. } => (*height, *width),
                    _ => (0.0, 0.0),
                };
                line_h = line_h.max(h);
                line_w = line_w.max(at + w);
            }
            let shift = match align {
                "center" | "-webkit-center" => ((width - line_w) / 2.0).max(0.0),
                "right" | "end" | "-webkit-right" => (width - line_w).max(0.0),
                _ => 0.0,
            };

            for &(i, at) in line {
                match &pieces[i] {
                    Piece::Word { text, style, background } => {
                        let fs = style.font_size_px();
                        let lh = line_height(style);
                        runs.push(TextRun {
                            rect: Rect {
                                x: x0 + shift + at,
                                y: y + (line_h - lh),
                                width: text.chars().count() as f32 * fs * ADVANCE_EM,
                                height: lh,
                            },
                            text: text.clone(),
                            font_size: fs,
                            color: style.value("color").unwrap_or("rgb(0, 0, 0)").to_string(),
                            background: background.clone(),
                            visible: style.value("visibility") == Some("visible"),
                        });
                    }
                    Piece::Image { node, style, width, height } => {
                        let src = self.doc.attribute(*node, "src").unwrap_or_default();
                        images.push(LayoutNode {
                            node: *node,
                            lb: LayoutBox {
                                rect: Rect {
                                    x: x0 + shift + at,
                                    y: y + line_h - height,
                                    width: *width,
                                    height: *height,
                                },
                                box_model: BoxModel::default(),
                            },
                            style: Rc::clone(style),
                            kind: LayoutKind::Image { src },
                            children: Vec::new(),
                            text: Vec::new(),
                        });
                    }
                    _ => {}
                }
            }
            y += line_h;
        }
        (images, runs, y - y0)
    }
}
