//! Arena DOM backing the source and cloned node trees of an export.
//!
//! Documents are parsed with `scraper` and then copied into a small mutable
//! arena so subtrees can be cloned, attached to an off-screen container and
//! discarded again. Stylesheets live alongside the tree: every `<style>`
//! element found while parsing becomes an author sheet, and callers can inject
//! further sheets which they later remove through the returned handle.

use std::sync::Arc;

use crate::style::{InlineStyle, StyleSheet};

/// Index of a node inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Handle to a stylesheet registered with [`Document::inject_style`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleHandle(u64);

#[derive(Debug, Clone)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    style: InlineStyle,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            style: InlineStyle::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct SheetEntry {
    handle: StyleHandle,
    owner: Option<NodeId>,
    sheet: Arc<StyleSheet>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// A mutable HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
    sheets: Vec<SheetEntry>,
    next_handle: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl Document {
    /// A document holding nothing but its root node.
    pub fn empty() -> Self {
        let root = Node {
            kind: NodeKind::Document,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: NodeId(0),
            sheets: Vec::new(),
            next_handle: 1,
        }
    }

    /// Parse an HTML document. `<style>` elements become author stylesheets
    /// in document order.
    pub fn parse(html: &str) -> Self {
        let parsed = scraper::Html::parse_document(html);
        let mut doc = Self::empty();
        let root = doc.root;
        doc.import_children(parsed.tree.root(), root);

        let style_nodes: Vec<NodeId> = doc
            .descendants(root)
            .into_iter()
            .filter(|&n| doc.tag_name(n) == Some("style"))
            .collect();
        for node in style_nodes {
            let css = doc.text_content(node);
            let handle = doc.alloc_handle();
            doc.sheets.push(SheetEntry {
                handle,
                owner: Some(node),
                sheet: Arc::new(StyleSheet::parse(&css)),
            });
        }
        doc
    }

    fn import_children(&mut self, source: ego_tree::NodeRef<'_, scraper::Node>, parent: NodeId) {
        for child in source.children() {
            match child.value() {
                scraper::Node::Element(el) => {
                    let id = self.create_element(el.name());
                    for (name, value) in el.attrs() {
                        self.set_attribute(id, name, value);
                    }
                    self.append_child(parent, id);
                    self.import_children(child, id);
                }
                scraper::Node::Text(text) => {
                    let id = self.create_text(&text.text);
                    self.append_child(parent, id);
                }
                scraper::Node::Comment(comment) => {
                    let id = self.alloc(NodeKind::Comment((*comment.comment).to_string()));
                    self.append_child(parent, id);
                }
                _ => self.import_children(child, parent),
            }
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn alloc_handle(&mut self) -> StyleHandle {
        let handle = StyleHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    // --- Tree structure ---

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<html>` element, if present.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.child_by_tag(self.document_element()?, "head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.child_by_tag(self.document_element()?, "body")
    }

    fn child_by_tag(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.tag_name(c) == Some(tag))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    /// Text of a text node (`None` for any other node kind).
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Text(t)) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Element children only, in order.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// Pre-order list of `id` and every node below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if self.node(node).is_none() {
                continue;
            }
            out.push(node);
            for &child in self.children(node).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// `id` followed by every element below it, in document order.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.is_element(n))
            .collect()
    }

    /// Whether the node is connected to the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == self.root {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(parent).is_none() || self.node(child).is_none() || parent == child {
            return;
        }
        self.detach(child);
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Remove a node from its parent. The subtree stays allocated.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = None;
        }
    }

    /// Detach a subtree and release its arena slots. Stylesheets owned by
    /// elements inside the subtree are unregistered as well.
    pub fn discard(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        self.detach(id);
        let doomed = self.descendants(id);
        self.sheets
            .retain(|s| s.owner.map_or(true, |owner| !doomed.contains(&owner)));
        for n in doomed {
            self.nodes[n.0] = None;
            self.free.push(n.0);
        }
    }

    /// Deep copy of a subtree. The copy is detached and owned by the caller.
    pub fn deep_clone(&mut self, id: NodeId) -> Option<NodeId> {
        let kind = self.node(id)?.kind.clone();
        let copy = self.alloc(kind);
        let children = self.children(id).to_vec();
        for child in children {
            if let Some(child_copy) = self.deep_clone(child) {
                self.append_child(copy, child_copy);
            }
        }
        Some(copy)
    }

    /// First attached element whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| self.attribute(n, "id").as_deref() == Some(id))
    }

    // --- Attributes and inline style ---

    /// Attribute value. `style` is served from the inline declaration block.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let el = self.element(id)?;
        if name.eq_ignore_ascii_case("style") {
            return if el.style.is_empty() {
                el.attrs
                    .iter()
                    .find(|(k, _)| k == "style")
                    .map(|_| String::new())
            } else {
                Some(el.style.css_text())
            };
        }
        el.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    pub fn attributes(&self, id: NodeId) -> Vec<(String, String)> {
        let Some(el) = self.element(id) else {
            return Vec::new();
        };
        el.attrs
            .iter()
            .map(|(k, v)| {
                if k == "style" {
                    (k.clone(), el.style.css_text())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        let name = name.to_ascii_lowercase();
        if name == "style" {
            el.style = InlineStyle::parse(value);
        }
        match el.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => el.attrs.push((name, value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        if name.eq_ignore_ascii_case("style") {
            el.style = InlineStyle::default();
        }
        el.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn classes(&self, id: NodeId) -> Vec<String> {
        self.attribute(id, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn inline_style(&self, id: NodeId) -> Option<&InlineStyle> {
        self.element(id).map(|el| &el.style)
    }

    /// Mutable inline declaration block; marks the `style` attribute present.
    pub fn inline_style_mut(&mut self, id: NodeId) -> Option<&mut InlineStyle> {
        let el = self.element_mut(id)?;
        if !el.attrs.iter().any(|(k, _)| k == "style") {
            el.attrs.push(("style".to_string(), String::new()));
        }
        Some(&mut el.style)
    }

    // --- Stylesheets ---

    /// Sheets that currently take part in the cascade, in cascade order.
    pub fn style_sheets(&self) -> Vec<Arc<StyleSheet>> {
        self.sheets
            .iter()
            .filter(|s| s.owner.map_or(true, |o| self.is_attached(o)))
            .map(|s| Arc::clone(&s.sheet))
            .collect()
    }

    pub fn style_sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Append a `<style>` element carrying `css` to `<head>` and register it
    /// last in cascade order.
    pub fn inject_style(&mut self, css: &str, element_id: Option<&str>) -> StyleHandle {
        let style_el = self.create_element("style");
        if let Some(id) = element_id {
            self.set_attribute(style_el, "id", id);
        }
        let text = self.create_text(css);
        self.append_child(style_el, text);
        let parent = self.head().or_else(|| self.document_element()).unwrap_or(self.root);
        self.append_child(parent, style_el);

        let handle = self.alloc_handle();
        self.sheets.push(SheetEntry {
            handle,
            owner: Some(style_el),
            sheet: Arc::new(StyleSheet::parse(css)),
        });
        handle
    }

    /// Remove exactly the sheet registered under `handle`, together with its
    /// `<style>` element. Returns false if the handle was already released.
    pub fn remove_style(&mut self, handle: StyleHandle) -> bool {
        let Some(pos) = self.sheets.iter().position(|s| s.handle == handle) else {
            return false;
        };
        let entry = self.sheets.remove(pos);
        if let Some(owner) = entry.owner {
            self.discard(owner);
        }
        true
    }

    // --- Serialization ---

    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            Some(NodeKind::Document) => {
                for &c in self.children(id) {
                    self.write_html(c, out);
                }
            }
            Some(NodeKind::Text(t)) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag_name(p))
                    .map_or(false, |t| t == "style" || t == "script");
                if raw {
                    out.push_str(t);
                } else {
                    out.push_str(&escape_text(t));
                }
            }
            Some(NodeKind::Comment(c)) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            Some(NodeKind::Element(el)) => {
                let attrs = self.attributes(id);
                write_start_tag(&el.tag, &attrs, out);
                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                for &c in self.children(id) {
                    self.write_html(c, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
            None => {}
        }
    }
}

pub(crate) fn write_start_tag(tag: &str, attrs: &[(String, String)], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for (k, v) in attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape_attr(v));
        out.push('"');
    }
    out.push('>');
}

pub(crate) fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}
