//! Cascade and computed values.
//!
//! [`StyleResolver`] plays the role of `getComputedStyle`: for each element it
//! runs the cascade over the user-agent sheet, the document's attached author
//! sheets and the inline block, then computes every property in
//! [`PROPERTIES`] plus the custom properties in scope.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use cssparser::{ParseError, Parser, ParserInput, Token};
use log::trace;

use super::properties::{lookup, ValueKind, PROPERTIES};
use super::StyleSheet;
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::safety::is_unsupported;

/// Longest value `var()` substitution may produce.
const MAX_SUBSTITUTION_LEN: usize = 64 * 1024;
const ROOT_FONT_SIZE: f32 = 16.0;

const UA_CSS: &str = r#"
html, body, div, p, h1, h2, h3, h4, h5, h6, ul, ol, dl, dt, dd, pre, blockquote,
header, footer, section, article, main, nav, aside, address, form, figure, hr { display: block }
li { display: list-item }
table { display: table; border-collapse: separate }
thead { display: table-header-group }
tbody { display: table-row-group }
tfoot { display: table-footer-group }
tr { display: table-row }
td, th { display: table-cell; padding: 1px }
head, style, script, title, meta, link, template { display: none }
img { display: inline-block }
body { margin: 8px }
p { margin: 1em 0 }
h1 { font-size: 2em; font-weight: bold; margin: 0.67em 0 }
h2 { font-size: 1.5em; font-weight: bold; margin: 0.83em 0 }
h3 { font-size: 1.17em; font-weight: bold; margin: 1em 0 }
h4, h5, h6 { font-weight: bold; margin: 1.33em 0 }
b, strong, th { font-weight: bold }
small { font-size: 13px }
hr { border-top: 1px solid #808080; margin: 8px 0 }
"#;

fn ua_sheet() -> &'static StyleSheet {
    static SHEET: OnceLock<StyleSheet> = OnceLock::new();
    SHEET.get_or_init(|| StyleSheet::parse(UA_CSS))
}

/// Resolved style of one element, in enumeration order.
///
/// A property whose value could not be computed (an unresolvable `var()`,
/// for instance) is kept with the reason instead of a value.
#[derive(Debug, Clone, Default)]
pub struct ComputedStyle {
    entries: Vec<(String, std::result::Result<String, String>)>,
    index: HashMap<String, usize>,
}

impl ComputedStyle {
    fn push(&mut self, name: &str, value: std::result::Result<String, String>) {
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push((name.to_string(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Property name at position `i`.
    pub fn item(&self, i: usize) -> Option<&str> {
        self.entries.get(i).map(|(n, _)| n.as_str())
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Value of `name`. Unknown properties read as the empty string; a
    /// property whose computation failed is an `UnsupportedStyle` error.
    pub fn get_property_value(&self, name: &str) -> Result<&str> {
        match self.index.get(name).map(|&i| &self.entries[i].1) {
            None => Ok(""),
            Some(Ok(v)) => Ok(v.as_str()),
            Some(Err(reason)) => Err(Error::UnsupportedStyle {
                property: name.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    /// Successfully computed value, if any.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.index.get(name).map(|&i| &self.entries[i].1) {
            Some(Ok(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Value of a length property in px. `None` for `auto`, percentages and
    /// anything else that is not an absolute length.
    pub fn px(&self, name: &str) -> Option<f32> {
        self.value(name)?.strip_suffix("px")?.trim().parse().ok()
    }

    pub fn font_size_px(&self) -> f32 {
        self.px("font-size").unwrap_or(ROOT_FONT_SIZE)
    }

    fn customs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(n, v)| match v {
            Ok(v) if n.starts_with("--") => Some((n.as_str(), v.as_str())),
            _ => None,
        })
    }
}

/// `(important, origin, layer, specificity, order)`; the greatest key wins.
type CascadeKey = (bool, u8, i32, u32, usize);

const UNLAYERED: i32 = i32::MAX;

#[derive(Debug)]
struct Cascaded {
    value: String,
    key: CascadeKey,
}

/// Computes and caches styles for the elements of one document snapshot.
///
/// The cache is only valid while the document is not mutated; build a fresh
/// resolver after changing attributes, inline styles or sheets.
pub struct StyleResolver<'a> {
    doc: &'a Document,
    sheets: Vec<Arc<StyleSheet>>,
    // per sheet: document-wide order of each of its layers
    layer_ranks: Vec<Vec<i32>>,
    cache: RefCell<HashMap<NodeId, Rc<ComputedStyle>>>,
}

impl<'a> StyleResolver<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let sheets = doc.style_sheets();
        let layer_ranks = layer_ranks(&sheets);
        Self {
            doc,
            sheets,
            layer_ranks,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Computed style of `node`. Text nodes report their parent's style;
    /// the document node reports initial values.
    pub fn computed_style(&self, node: NodeId) -> Rc<ComputedStyle> {
        if let Some(hit) = self.cache.borrow().get(&node) {
            return Rc::clone(hit);
        }
        if !self.doc.is_element(node) {
            return match self.doc.parent(node) {
                Some(p) if self.doc.is_element(p) => self.computed_style(p),
                _ => Rc::new(self.compute(HashMap::new(), None)),
            };
        }

        let parent = self
            .doc
            .parent(node)
            .filter(|&p| self.doc.is_element(p))
            .map(|p| self.computed_style(p));
        let specified = self.cascade(node);
        let style = Rc::new(self.compute(specified, parent.as_deref()));
        self.cache.borrow_mut().insert(node, Rc::clone(&style));
        style
    }

    fn cascade(&self, node: NodeId) -> HashMap<String, String> {
        let mut winners: HashMap<String, Cascaded> = HashMap::new();
        let mut order = 0usize;
        let mut offer = |name: &str, value: &str, key: CascadeKey| {
            let replace = winners.get(name).map_or(true, |w| key >= w.key);
            if replace {
                winners.insert(
                    name.to_string(),
                    Cascaded {
                        value: value.to_string(),
                        key,
                    },
                );
            }
        };

        let sheets = std::iter::once((0u8, ua_sheet(), &[][..])).chain(
            self.sheets
                .iter()
                .zip(&self.layer_ranks)
                .map(|(s, ranks)| (1u8, s.as_ref(), ranks.as_slice())),
        );
        for (origin, sheet, ranks) in sheets {
            for rule in sheet.rules() {
                let best = rule
                    .selectors
                    .iter()
                    .filter(|s| s.matches(self.doc, node))
                    .map(|s| s.specificity())
                    .max();
                let Some(specificity) = best else {
                    continue;
                };
                let layer = rule
                    .layer
                    .and_then(|i| ranks.get(i).copied())
                    .unwrap_or(UNLAYERED);
                for decl in &rule.declarations {
                    order += 1;
                    let key = if decl.important {
                        // important reverses both origins and layers
                        let origin = if origin == 0 { 3 } else { origin };
                        let layer = if layer == UNLAYERED { i32::MIN } else { -layer };
                        (true, origin, layer, specificity, order)
                    } else {
                        (false, origin, layer, specificity, order)
                    };
                    offer(&decl.name, &decl.value, key);
                }
            }
        }
        if let Some(inline) = self.doc.inline_style(node) {
            for decl in inline.declarations() {
                order += 1;
                offer(&decl.name, &decl.value, (decl.important, 2, UNLAYERED, u32::MAX, order));
            }
        }

        winners.into_iter().map(|(k, v)| (k, v.value)).collect()
    }

    fn compute(&self, specified: HashMap<String, String>, parent: Option<&ComputedStyle>) -> ComputedStyle {
        // custom properties first: everything else may reference them
        let mut raw_customs: BTreeMap<String, String> = parent
            .map(|p| p.customs().map(|(n, v)| (n.to_string(), v.to_string())).collect())
            .unwrap_or_default();
        for (name, value) in &specified {
            if name.starts_with("--") {
                raw_customs.insert(name.clone(), value.clone());
            }
        }
        let mut vars = VarResolver::new(&raw_customs);
        let customs: BTreeMap<String, std::result::Result<String, String>> = raw_customs
            .keys()
            .map(|name| (name.clone(), vars.resolve(name)))
            .collect();

        let parent_font = parent.map_or(ROOT_FONT_SIZE, ComputedStyle::font_size_px);
        let parent_color = parent
            .and_then(|p| p.value("color"))
            .unwrap_or("rgb(0, 0, 0)")
            .to_string();

        let mut specified_value = |name: &str| -> Option<std::result::Result<String, String>> {
            let raw = specified.get(name)?;
            Some(vars.substitute(raw))
        };

        // font-size and color feed every other computation
        let font_size = match specified_value("font-size") {
            Some(Ok(v)) => match keyword_default(&v, "font-size", parent) {
                Some(d) => Ok(d),
                None => font_size_px(&v, parent_font)
                    .map(format_px)
                    .ok_or_else(|| format!("invalid font-size {v:?}")),
            },
            Some(Err(e)) => Err(e),
            None => Ok(format_px(parent_font)),
        };
        let font_px = font_size
            .as_deref()
            .ok()
            .and_then(|v| v.strip_suffix("px"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(parent_font);

        let color = match specified_value("color") {
            Some(Ok(v)) => match keyword_default(&v, "color", parent) {
                Some(d) => Ok(d),
                None if v.eq_ignore_ascii_case("currentcolor") => Ok(parent_color.clone()),
                None => Ok(normalize_color(&v)),
            },
            Some(Err(e)) => Err(e),
            None => Ok(parent_color.clone()),
        };
        let current_color = color.clone().unwrap_or(parent_color);

        let mut out = ComputedStyle::default();
        let mut border_styles: HashMap<&str, String> = HashMap::new();

        for def in PROPERTIES {
            let value = match def.name {
                "font-size" => font_size.clone(),
                "color" => color.clone(),
                name => match specified_value(name) {
                    Some(Ok(v)) => match keyword_default(&v, name, parent) {
                        Some(d) => Ok(d),
                        None => Ok(compute_value(def.kind, name, &v, font_px, &current_color)),
                    },
                    Some(Err(e)) => Err(e),
                    None => Ok(match parent.filter(|_| def.inherited).and_then(|p| p.value(name)) {
                        Some(v) => v.to_string(),
                        None => compute_value(def.kind, name, def.initial, font_px, &current_color),
                    }),
                },
            };
            if def.name.ends_with("-style") {
                if let Ok(v) = &value {
                    border_styles.insert(def.name, v.clone());
                }
            }
            out.push(def.name, value);
        }

        // a side (or outline) with no style has no width
        for prefix in ["border-bottom", "border-left", "border-right", "border-top", "outline"] {
            let style = border_styles.get(format!("{prefix}-style").as_str()).map(String::as_str);
            if matches!(style, Some("none") | Some("hidden") | None) {
                let width = format!("{prefix}-width");
                if let Some(&i) = out.index.get(&width) {
                    if out.entries[i].1.is_ok() {
                        out.entries[i].1 = Ok("0px".to_string());
                    }
                }
            }
        }

        for (name, value) in customs {
            out.push(&name, value);
        }
        trace!("computed {} properties", out.len());
        out
    }
}

/// `inherit`, `initial` and `unset`.
fn keyword_default(value: &str, name: &str, parent: Option<&ComputedStyle>) -> Option<String> {
    let def = lookup(name)?;
    let from_parent = || parent.and_then(|p| p.value(name)).map(str::to_string);
    let initial = || match def.name {
        "font-size" => "16px".to_string(),
        "color" => "rgb(0, 0, 0)".to_string(),
        _ => def.initial.to_string(),
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "inherit" => Some(from_parent().unwrap_or_else(initial)),
        "initial" => Some(initial()),
        "unset" if def.inherited => Some(from_parent().unwrap_or_else(initial)),
        "unset" => Some(initial()),
        _ => None,
    }
}

fn compute_value(kind: ValueKind, name: &str, value: &str, font_px: f32, current_color: &str) -> String {
    let v = value.trim();
    match kind {
        ValueKind::Color => {
            let lower = v.to_ascii_lowercase();
            if lower == "currentcolor" || (lower == "auto" && name == "caret-color") {
                current_color.to_string()
            } else if lower == "auto" || lower == "none" {
                lower
            } else {
                normalize_color(v)
            }
        }
        ValueKind::Length => {
            let keyword = match v.to_ascii_lowercase().as_str() {
                "thin" if name.ends_with("-width") => Some(1.0),
                "medium" if name.ends_with("-width") => Some(3.0),
                "thick" if name.ends_with("-width") => Some(5.0),
                _ => None,
            };
            match keyword.or_else(|| length_px(v, font_px)) {
                Some(px) => format_px(px),
                None => v.to_string(),
            }
        }
        ValueKind::Keyword if name == "font-weight" => match v.to_ascii_lowercase().as_str() {
            "normal" | "lighter" => "400".to_string(),
            "bold" | "bolder" => "700".to_string(),
            _ => v.to_string(),
        },
        ValueKind::Image | ValueKind::Keyword => v.to_string(),
    }
}

/// `rgb(r, g, b)` / `rgba(r, g, b, a)` for parseable colors. Unsupported
/// color functions are passed through untouched, as browsers do.
pub(crate) fn normalize_color(value: &str) -> String {
    let v = value.trim();
    if is_unsupported(v) {
        return v.to_string();
    }
    match csscolorparser::parse(v) {
        Ok(c) => {
            let [r, g, b, a] = c.to_rgba8();
            if a == 255 {
                format!("rgb({r}, {g}, {b})")
            } else {
                let alpha = (a as f32 / 255.0 * 100.0).round() / 100.0;
                format!("rgba({r}, {g}, {b}, {alpha})")
            }
        }
        Err(_) => v.to_string(),
    }
}

/// Absolute or font-relative length to px.
pub(crate) fn length_px(value: &str, font_px: f32) -> Option<f32> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let px = match parser.next().ok()? {
        Token::Number { value, .. } if *value == 0.0 => 0.0,
        Token::Dimension { value, unit, .. } => {
            let factor = match unit.to_ascii_lowercase().as_str() {
                "px" => 1.0,
                "pt" => 96.0 / 72.0,
                "pc" => 16.0,
                "in" => 96.0,
                "cm" => 96.0 / 2.54,
                "mm" => 96.0 / 25.4,
                "em" => font_px,
                "rem" => ROOT_FONT_SIZE,
                _ => return None,
            };
            value * factor
        }
        _ => return None,
    };
    parser.is_exhausted().then_some(px)
}

fn font_size_px(value: &str, parent_px: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    let keyword = match v.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "smaller" => Some(parent_px / 1.2),
        "larger" => Some(parent_px * 1.2),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }
    if let Some(pct) = v.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|p| p / 100.0 * parent_px);
    }
    length_px(&v, parent_px)
}

/// `12px`, `12.5px`; at most two decimals.
pub(crate) fn format_px(px: f32) -> String {
    let rounded = (px * 100.0).round() / 100.0;
    format!("{rounded}px")
}

/// Order of every layer name across `sheets`, by first appearance, mapped
/// back onto each sheet's own layer indices.
fn layer_ranks(sheets: &[Arc<StyleSheet>]) -> Vec<Vec<i32>> {
    let mut order: Vec<&str> = Vec::new();
    for name in sheets.iter().flat_map(|s| s.layers()) {
        if !order.contains(&name.as_str()) {
            order.push(name);
        }
    }
    sheets
        .iter()
        .map(|sheet| {
            sheet
                .layers()
                .iter()
                .map(|name| order.iter().position(|o| o == name).unwrap_or(0) as i32)
                .collect()
        })
        .collect()
}

/// `var()` substitution for one element.
///
/// Each custom property is resolved at most once; a property reached again
/// while it is still being resolved is part of a cycle and fails.
struct VarResolver<'r> {
    raw: &'r BTreeMap<String, String>,
    resolved: HashMap<String, std::result::Result<String, String>>,
    visiting: HashSet<String>,
}

impl<'r> VarResolver<'r> {
    fn new(raw: &'r BTreeMap<String, String>) -> Self {
        Self {
            raw,
            resolved: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    fn resolve(&mut self, name: &str) -> std::result::Result<String, String> {
        if let Some(done) = self.resolved.get(name) {
            return done.clone();
        }
        let Some(raw) = self.raw.get(name) else {
            return Err(format!("undefined custom property {name}"));
        };
        if !self.visiting.insert(name.to_string()) {
            return Err(format!("custom property {name} references itself"));
        }
        let result = self.substitute(raw);
        self.visiting.remove(name);
        self.resolved.insert(name.to_string(), result.clone());
        result
    }

    /// Replace every `var(--name[, fallback])` in `value`.
    fn substitute(&mut self, value: &str) -> std::result::Result<String, String> {
        if !value.contains("var(") {
            return Ok(value.to_string());
        }
        let mut input = ParserInput::new(value);
        let mut parser = Parser::new(&mut input);
        let mut out = String::with_capacity(value.len());
        self.substitute_into(&mut parser, &mut out)?;
        Ok(out.trim().to_string())
    }

    fn substitute_into(&mut self, input: &mut Parser<'_, '_>, out: &mut String) -> std::result::Result<(), String> {
        let mut copied = input.position();
        loop {
            let before = input.position();
            let token = match input.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };
            let closing = match token {
                Token::Function(ref name) if name.eq_ignore_ascii_case("var") => {
                    out.push_str(input.slice(copied..before));
                    let (name, fallback) = input
                        .parse_nested_block(var_reference)
                        .map_err(|_| "malformed var() reference".to_string())?;
                    let replacement = match (self.resolve(&name), fallback) {
                        (Ok(v), _) => v,
                        (Err(_), Some(fallback)) => self.substitute(&fallback)?,
                        (Err(e), None) => return Err(e),
                    };
                    out.push_str(&replacement);
                    if out.len() > MAX_SUBSTITUTION_LEN {
                        return Err(format!("var() substitution exceeds {MAX_SUBSTITUTION_LEN} bytes"));
                    }
                    copied = input.position();
                    continue;
                }
                Token::Function(_) | Token::ParenthesisBlock => ")",
                Token::SquareBracketBlock => "]",
                Token::CurlyBracketBlock => "}",
                _ => continue,
            };
            // copy through the opening token, substitute inside the block
            out.push_str(input.slice(copied..input.position()));
            input
                .parse_nested_block(|p| Ok::<_, ParseError<'_, ()>>(self.substitute_into(p, out)))
                .map_err(|_| "malformed block".to_string())??;
            out.push_str(closing);
            copied = input.position();
        }
        out.push_str(input.slice_from(copied));
        Ok(())
    }
}

/// The inside of `var( ... )`: a custom property name and an optional
/// fallback, which may be empty.
fn var_reference<'i>(input: &mut Parser<'i, '_>) -> std::result::Result<(String, Option<String>), ParseError<'i, ()>> {
    let name = input.expect_ident_cloned()?;
    if !name.starts_with("--") {
        return Err(input.new_custom_error(()));
    }
    let fallback = if input.try_parse(|p| p.expect_comma()).is_ok() {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Some(input.slice_from(start).trim().to_string())
    } else {
        input.expect_exhausted()?;
        None
    };
    Ok((name.to_string(), fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style_of(html: &str, id: &str) -> Rc<ComputedStyle> {
        let doc = Document::parse(html);
        let node = doc.get_element_by_id(id).unwrap();
        let resolver = StyleResolver::new(&doc);
        resolver.computed_style(node)
    }

    #[test]
    fn cascade_orders_by_importance_origin_and_specificity() {
        let html = r#"<html><head><style>
            .a { color: red }
            #x { color: green }
            p { color: blue !important; width: 10px }
        </style></head><body><p id="x" class="a" style="width: 20px">t</p></body></html>"#;
        let s = style_of(html, "x");
        assert_eq!(s.value("color"), Some("rgb(0, 0, 255)"));
        assert_eq!(s.value("width"), Some("20px"));
        assert_eq!(s.value("display"), Some("block"));
    }

    #[test]
    fn inheritance_and_current_color() {
        let html = r#"<div style="color: #ff0000; font-size: 10px"><span id="s" style="border: 1px solid">x</span></div>"#;
        let s = style_of(html, "s");
        assert_eq!(s.value("color"), Some("rgb(255, 0, 0)"));
        assert_eq!(s.value("font-size"), Some("10px"));
        assert_eq!(s.value("border-top-color"), Some("rgb(255, 0, 0)"));
        assert_eq!(s.value("border-top-width"), Some("1px"));
        // non-inherited
        assert_eq!(s.value("background-color"), Some("rgba(0, 0, 0, 0)"));
    }

    #[test]
    fn em_lengths_and_border_widths() {
        let html = r#"<div id="d" style="font-size: 20px; padding-left: 2em; margin-top: 12pt; border-left-width: thick"></div>"#;
        let s = style_of(html, "d");
        assert_eq!(s.value("padding-left"), Some("40px"));
        assert_eq!(s.value("margin-top"), Some("16px"));
        // no border style
        assert_eq!(s.value("border-left-width"), Some("0px"));
        assert_eq!(s.px("padding-left"), Some(40.0));
    }

    #[test]
    fn unsupported_colors_survive_computation() {
        let html = r#"<span id="s" style="color: oklch(0.6 0.2 250)">x</span>"#;
        let s = style_of(html, "s");
        assert_eq!(s.value("color"), Some("oklch(0.6 0.2 250)"));
        assert_eq!(s.value("caret-color"), Some("oklch(0.6 0.2 250)"));
    }

    #[test]
    fn custom_properties_resolve_and_inherit() {
        let html = r#"<div style="--brand: #00ff00; --ring: var(--brand)"><p id="p" style="color: var(--ring); background-color: var(--nope, white)">x</p></div>"#;
        let s = style_of(html, "p");
        assert_eq!(s.value("color"), Some("rgb(0, 255, 0)"));
        assert_eq!(s.value("background-color"), Some("rgb(255, 255, 255)"));
        assert_eq!(s.value("--ring"), Some("#00ff00"));
        let names: Vec<&str> = s.property_names().collect();
        assert_eq!(&names[names.len() - 2..], &["--brand", "--ring"]);
    }

    #[test]
    fn unresolvable_var_is_an_error_for_that_property_only() {
        let html = r#"<p id="p" style="color: var(--missing); width: 5px">x</p>"#;
        let s = style_of(html, "p");
        assert!(matches!(
            s.get_property_value("color"),
            Err(Error::UnsupportedStyle { .. })
        ));
        assert_eq!(s.get_property_value("width").unwrap(), "5px");
        assert_eq!(s.get_property_value("not-a-property").unwrap(), "");
    }

    #[test]
    fn cyclic_custom_properties_fail() {
        let html = r#"<p id="p" style="--a: var(--b); --b: var(--a); color: var(--a)">x</p>"#;
        let s = style_of(html, "p");
        assert!(s.get_property_value("color").is_err());
    }

    #[test]
    fn layered_rules_apply_and_yield_to_unlayered_ones() {
        let html = r#"<html><head><style>
            @layer base, utilities;
            @layer utilities { .t { color: rgb(255,0,0) } .u { width: 1px } }
            @layer base { .u { width: 2px; height: 3px !important } }
            .v { color: blue }
            @layer utilities { .v { color: green } .u { height: 4px !important } }
        </style></head><body><p id="t" class="t">x</p><p id="u" class="u">x</p><p id="v" class="t v">x</p></body></html>"#;
        assert_eq!(style_of(html, "t").value("color"), Some("rgb(255, 0, 0)"));
        let u = style_of(html, "u");
        // later layer wins for normal declarations, earlier for important ones
        assert_eq!(u.value("width"), Some("1px"));
        assert_eq!(u.value("height"), Some("3px"));
        assert_eq!(style_of(html, "v").value("color"), Some("rgb(0, 0, 255)"));
    }

    #[test]
    fn universal_reset_with_pseudo_elements_still_applies() {
        let html = r#"<html><head><style>
            *, ::before, ::after { border-width: 0; border-style: solid; border-color: #e5e7eb }
            .border { border-width: 1px }
        </style></head><body><div id="d" class="border">x</div><div id="e">y</div></body></html>"#;
        let d = style_of(html, "d");
        assert_eq!(d.value("border-top-style"), Some("solid"));
        assert_eq!(d.value("border-top-width"), Some("1px"));
        assert_eq!(d.value("border-top-color"), Some("rgb(229, 231, 235)"));
        assert_eq!(style_of(html, "e").value("border-left-width"), Some("0px"));
    }

    #[test]
    fn media_blocks_follow_the_screen_viewport() {
        let html = r#"<html><head><style>
            @media (min-width: 640px) { .m { color: green } }
            @media print { .m { color: red } }
            @media (min-width: 1024px) { .m { width: 5px } }
        </style></head><body><p id="m" class="m">x</p></body></html>"#;
        let m = style_of(html, "m");
        assert_eq!(m.value("color"), Some("rgb(0, 128, 0)"));
        assert_eq!(m.value("width"), Some("auto"));
    }

    #[test]
    fn chained_var_references_resolve_once_each() {
        let mut decls = vec!["--c0: x".to_string()];
        for i in 1..=12 {
            let prev = format!("var(--c{})", i - 1);
            decls.push(format!("--c{i}: {prev} {prev} {prev} {prev}"));
        }
        decls.push("color: var(--c12)".to_string());
        decls.push("background-color: var(--c1, red)".to_string());
        let html = format!(r#"<p id="p" style="{}">x</p>"#, decls.join("; "));

        let started = std::time::Instant::now();
        let s = style_of(&html, "p");
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        assert_eq!(s.value("--c1"), Some("x x x x"));
        assert_eq!(s.value("--c7").map(str::len), Some(2 * 4usize.pow(7) - 1));
        assert!(s.get_property_value("--c8").is_err());
        assert!(s.get_property_value("color").is_err());
        // resolvable but not a color: kept as written
        assert_eq!(s.value("background-color"), Some("x x x x"));
    }

    #[test]
    fn detached_sheets_do_not_apply() {
        let mut doc = Document::parse("<p id=\"p\">x</p>");
        let handle = doc.inject_style("p { color: red }", None);
        let p = doc.get_element_by_id("p").unwrap();
        assert_eq!(StyleResolver::new(&doc).computed_style(p).value("color"), Some("rgb(255, 0, 0)"));
        doc.remove_style(handle);
        assert_eq!(StyleResolver::new(&doc).computed_style(p).value("color"), Some("rgb(0, 0, 0)"));
    }
}
