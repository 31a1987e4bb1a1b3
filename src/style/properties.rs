//! The set of properties the resolver computes, with their initial values.
//!
//! This is the list a computed style enumerates, in the order it enumerates
//! them. Custom properties are appended after it at resolution time.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Color,
    Length,
    Image,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: &'static str,
    pub kind: ValueKind,
    pub inherited: bool,
    pub initial: &'static str,
}

const fn def(name: &'static str, kind: ValueKind, inherited: bool, initial: &'static str) -> PropertyDef {
    PropertyDef {
        name,
        kind,
        inherited,
        initial,
    }
}

use ValueKind::*;

/// Alphabetical, like the enumeration order of `getComputedStyle`.
pub const PROPERTIES: &[PropertyDef] = &[
    def("accent-color", Color, true, "auto"),
    def("background-color", Color, false, "rgba(0, 0, 0, 0)"),
    def("background-image", Image, false, "none"),
    def("border-bottom-color", Color, false, "currentcolor"),
    def("border-bottom-style", Keyword, false, "none"),
    def("border-bottom-width", Length, false, "medium"),
    def("border-collapse", Keyword, true, "separate"),
    def("border-left-color", Color, false, "currentcolor"),
    def("border-left-style", Keyword, false, "none"),
    def("border-left-width", Length, false, "medium"),
    def("border-right-color", Color, false, "currentcolor"),
    def("border-right-style", Keyword, false, "none"),
    def("border-right-width", Length, false, "medium"),
    def("border-top-color", Color, false, "currentcolor"),
    def("border-top-style", Keyword, false, "none"),
    def("border-top-width", Length, false, "medium"),
    def("box-shadow", Keyword, false, "none"),
    def("box-sizing", Keyword, false, "content-box"),
    def("caret-color", Color, true, "auto"),
    def("color", Color, true, "rgb(0, 0, 0)"),
    def("column-rule-color", Color, false, "currentcolor"),
    def("display", Keyword, false, "inline"),
    def("fill", Color, true, "rgb(0, 0, 0)"),
    def("flex-direction", Keyword, false, "row"),
    def("flood-color", Color, false, "rgb(0, 0, 0)"),
    def("font-family", Keyword, true, "Arial, sans-serif"),
    def("font-size", Length, true, "16px"),
    def("font-style", Keyword, true, "normal"),
    def("font-weight", Keyword, true, "400"),
    def("height", Length, false, "auto"),
    def("left", Length, false, "auto"),
    def("letter-spacing", Length, true, "normal"),
    def("lighting-color", Color, false, "rgb(255, 255, 255)"),
    def("line-height", Length, true, "normal"),
    def("list-style-type", Keyword, true, "disc"),
    def("margin-bottom", Length, false, "0px"),
    def("margin-left", Length, false, "0px"),
    def("margin-right", Length, false, "0px"),
    def("margin-top", Length, false, "0px"),
    def("max-width", Length, false, "none"),
    def("min-height", Length, false, "0px"),
    def("min-width", Length, false, "0px"),
    def("opacity", Keyword, false, "1"),
    def("outline-color", Color, false, "currentcolor"),
    def("outline-style", Keyword, false, "none"),
    def("outline-width", Length, false, "medium"),
    def("overflow", Keyword, false, "visible"),
    def("padding-bottom", Length, false, "0px"),
    def("padding-left", Length, false, "0px"),
    def("padding-right", Length, false, "0px"),
    def("padding-top", Length, false, "0px"),
    def("position", Keyword, false, "static"),
    def("print-color-adjust", Keyword, true, "economy"),
    def("stop-color", Color, false, "rgb(0, 0, 0)"),
    def("stroke", Color, true, "none"),
    def("text-align", Keyword, true, "start"),
    def("text-decoration-color", Color, false, "currentcolor"),
    def("text-decoration-line", Keyword, false, "none"),
    def("text-shadow", Keyword, true, "none"),
    def("text-transform", Keyword, true, "none"),
    def("top", Length, false, "auto"),
    def("vertical-align", Keyword, false, "baseline"),
    def("visibility", Keyword, true, "visible"),
    def("white-space", Keyword, true, "normal"),
    def("width", Length, false, "auto"),
];

pub fn lookup(name: &str) -> Option<&'static PropertyDef> {
    PROPERTIES
        .binary_search_by(|p| p.name.cmp(name))
        .ok()
        .map(|i| &PROPERTIES[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_unique() {
        for pair in PROPERTIES.windows(2) {
            assert!(pair[0].name < pair[1].name, "{} / {}", pair[0].name, pair[1].name);
        }
    }

    #[test]
    fn lookup_finds_known_properties() {
        assert_eq!(lookup("color").map(|p| p.inherited), Some(true));
        assert_eq!(lookup("border-top-color").map(|p| p.kind), Some(ValueKind::Color));
        assert!(lookup("--tw-ring-color").is_none());
    }
}
