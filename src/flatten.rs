//! Style flattening.
//!
//! Every computed property of a source element is written onto the matching
//! element of a clone as an `!important` inline declaration, after passing
//! through the color safety filter. The clone then renders the same without
//! any stylesheet, and without the color syntax the rasterizer cannot read.

use log::debug;

use crate::dom::{escape_text, is_void_element, write_start_tag, Document, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::safety::{FallbackPalette, SafetyDecision};
use crate::style::{ComputedStyle, InlineStyle, StyleResolver};

/// What a flattening pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenReport {
    pub elements: usize,
    pub passed: usize,
    pub fallbacks: usize,
    pub dropped: usize,
    /// Properties whose value could not be read.
    pub skipped: usize,
}

impl FlattenReport {
    fn merge(&mut self, other: FlattenReport) {
        self.elements += other.elements;
        self.passed += other.passed;
        self.fallbacks += other.fallbacks;
        self.dropped += other.dropped;
        self.skipped += other.skipped;
    }
}

/// Decisions for one element, in the order they must be written.
fn plan_element(style: &ComputedStyle, palette: &FallbackPalette) -> (Vec<(String, String)>, FlattenReport) {
    let mut writes = Vec::with_capacity(style.len());
    let mut companions = Vec::new();
    let mut report = FlattenReport {
        elements: 1,
        ..Default::default()
    };

    for name in style.property_names() {
        let value = match style.get_property_value(name) {
            Ok(v) => v,
            Err(e) => {
                debug!("skipping {name}: {e}");
                report.skipped += 1;
                continue;
            }
        };
        if value.is_empty() {
            continue;
        }
        match palette.classify(name, value) {
            SafetyDecision::PassThrough(v) => {
                report.passed += 1;
                writes.push((name.to_string(), v));
            }
            SafetyDecision::Fallback(v) => {
                report.fallbacks += 1;
                writes.push((name.to_string(), v));
            }
            SafetyDecision::Drop => {
                report.dropped += 1;
                if let Some((prop, v)) = palette.companion(name) {
                    companions.push((prop.to_string(), v.to_string()));
                }
            }
        }
    }
    // companions win over whatever the property loop wrote
    writes.extend(companions);
    (writes, report)
}

fn mismatch(doc: &Document, source: NodeId, clone: NodeId) -> Error {
    Error::TreeMismatch(format!(
        "source <{}> does not line up with clone <{}>",
        doc.tag_name(source).unwrap_or("#text"),
        doc.tag_name(clone).unwrap_or("#text"),
    ))
}

fn plan_pair(
    doc: &Document,
    resolver: &StyleResolver<'_>,
    source: NodeId,
    clone: NodeId,
    palette: &FallbackPalette,
    plan: &mut Vec<(NodeId, Vec<(String, String)>)>,
    report: &mut FlattenReport,
) -> Result<()> {
    match (doc.kind(source), doc.kind(clone)) {
        (Some(NodeKind::Element(_)), Some(NodeKind::Element(_))) => {
            if doc.tag_name(source) != doc.tag_name(clone) {
                return Err(mismatch(doc, source, clone));
            }
            let (writes, r) = plan_element(&resolver.computed_style(source), palette);
            report.merge(r);
            plan.push((clone, writes));
        }
        (Some(NodeKind::Text(_)), Some(NodeKind::Text(_)))
        | (Some(NodeKind::Comment(_)), Some(NodeKind::Comment(_))) => return Ok(()),
        _ => return Err(mismatch(doc, source, clone)),
    }

    let (src_children, clone_children) = (doc.children(source), doc.children(clone));
    if src_children.len() != clone_children.len() {
        return Err(mismatch(doc, source, clone));
    }
    for (&s, &c) in src_children.iter().zip(clone_children) {
        plan_pair(doc, resolver, s, c, palette, plan, report)?;
    }
    Ok(())
}

/// Flatten the computed styles of `source` onto `clone`, which must be a
/// structural copy of it. Classes and ids are removed from the clone.
///
/// All styles are read before anything is written, so `source` and `clone`
/// may be the same subtree.
pub fn flatten_into(
    doc: &mut Document,
    source: NodeId,
    clone: NodeId,
    palette: &FallbackPalette,
) -> Result<FlattenReport> {
    let mut plan = Vec::new();
    let mut report = FlattenReport::default();
    {
        let resolver = StyleResolver::new(doc);
        plan_pair(doc, &resolver, source, clone, palette, &mut plan, &mut report)?;
    }

    for (node, writes) in plan {
        if let Some(style) = doc.inline_style_mut(node) {
            for (name, value) in &writes {
                style.set_property(name, value, true);
            }
        }
        doc.remove_attribute(node, "class");
        doc.remove_attribute(node, "id");
    }
    debug!(
        "flattened {} elements ({} fallbacks, {} dropped, {} skipped)",
        report.elements, report.fallbacks, report.dropped, report.skipped
    );
    Ok(report)
}

/// Deep-clone `source` and flatten onto the copy. The returned clone is
/// detached; the caller attaches or discards it.
pub fn styled_clone(
    doc: &mut Document,
    source: NodeId,
    palette: &FallbackPalette,
) -> Result<(NodeId, FlattenReport)> {
    let clone = doc
        .deep_clone(source)
        .ok_or_else(|| Error::NotFound(format!("node {source:?}")))?;
    match flatten_into(doc, source, clone, palette) {
        Ok(report) => Ok((clone, report)),
        Err(e) => {
            doc.discard(clone);
            Err(e)
        }
    }
}

/// Serialize `source` with the flattened styles as `style` attributes,
/// leaving the document untouched.
pub fn flatten_to_html(doc: &Document, source: NodeId, palette: &FallbackPalette) -> Result<String> {
    if !doc.is_element(source) {
        return Err(Error::NotFound(format!("element {source:?}")));
    }
    let resolver = StyleResolver::new(doc);
    let mut out = String::new();
    write_flattened(doc, &resolver, source, palette, &mut out);
    Ok(out)
}

fn write_flattened(
    doc: &Document,
    resolver: &StyleResolver<'_>,
    node: NodeId,
    palette: &FallbackPalette,
    out: &mut String,
) {
    match doc.kind(node) {
        Some(NodeKind::Element(_)) => {
            let tag = doc.tag_name(node).unwrap_or("div");
            let (writes, _) = plan_element(&resolver.computed_style(node), palette);
            let mut style = InlineStyle::default();
            for (name, value) in &writes {
                style.set_property(name, value, false);
            }
            let mut attrs: Vec<(String, String)> = doc
                .attributes(node)
                .into_iter()
                .filter(|(k, _)| !matches!(k.as_str(), "class" | "id" | "style"))
                .collect();
            attrs.push(("style".to_string(), style.css_text()));
            write_start_tag(tag, &attrs, out);
            if is_void_element(tag) {
                return;
            }
            for &child in doc.children(node) {
                write_flattened(doc, resolver, child, palette, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Some(NodeKind::Text(t)) => {
            let raw = doc
                .parent(node)
                .and_then(|p| doc.tag_name(p))
                .map_or(false, |t| t == "style" || t == "script");
            if raw {
                out.push_str(t);
            } else {
                out.push_str(&escape_text(t));
            }
        }
        _ => {}
    }
}
