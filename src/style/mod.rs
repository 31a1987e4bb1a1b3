//! Minimal CSS engine: stylesheet parsing, selector matching, the cascade and
//! computed-style resolution.
//!
//! Only what the export pipeline needs is modelled. Values are kept as
//! strings the way `getComputedStyle` exposes them, so the flattening pass can
//! copy them verbatim into inline declarations.

pub mod computed;
pub mod media;
pub mod properties;
pub mod selector;
pub mod sheet;

pub use computed::{ComputedStyle, StyleResolver};
pub use media::MediaContext;
pub use properties::{PropertyDef, ValueKind, PROPERTIES};
pub use selector::Selector;
pub use sheet::{StyleRule, StyleSheet};

/// A single `name: value [!important]` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    pub fn new(name: &str, value: &str, important: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            important,
        }
    }
}

/// The declaration block behind an element's `style` attribute.
///
/// Shorthands are expanded on the way in, so the block only ever holds
/// longhands and custom properties, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    decls: Vec<Declaration>,
}

impl InlineStyle {
    pub fn parse(text: &str) -> Self {
        let mut style = Self::default();
        for decl in sheet::parse_declarations(text) {
            style.put(decl);
        }
        style
    }

    fn put(&mut self, decl: Declaration) {
        match self.decls.iter_mut().find(|d| d.name == decl.name) {
            Some(slot) => *slot = decl,
            None => self.decls.push(decl),
        }
    }

    /// Set a property, replacing any previous declaration (and its priority)
    /// in place. An empty value removes the property.
    pub fn set_property(&mut self, name: &str, value: &str, important: bool) {
        let value = value.trim();
        if value.is_empty() {
            self.remove_property(name);
            return;
        }
        let mut expanded = Vec::new();
        sheet::expand_shorthand(name, value, important, &mut expanded);
        for decl in expanded {
            self.put(decl);
        }
    }

    pub fn get_property_value(&self, name: &str) -> Option<&str> {
        self.decls
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    pub fn is_important(&self, name: &str) -> bool {
        self.decls.iter().any(|d| d.name == name && d.important)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<String> {
        let pos = self.decls.iter().position(|d| d.name == name)?;
        Some(self.decls.remove(pos).value)
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.decls
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Serialized form, as found in a `style` attribute.
    pub fn css_text(&self) -> String {
        let parts: Vec<String> = self
            .decls
            .iter()
            .map(|d| {
                if d.important {
                    format!("{}: {} !important;", d.name, d.value)
                } else {
                    format!("{}: {};", d.name, d.value)
                }
            })
            .collect();
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_style_expands_and_replaces() {
        let mut s = InlineStyle::parse("padding: 1px 2px; color: red !important");
        assert_eq!(s.get_property_value("padding-right"), Some("2px"));
        assert_eq!(s.get_property_value("padding-bottom"), Some("1px"));
        assert!(s.is_important("color"));

        s.set_property("color", "blue", false);
        assert_eq!(s.get_property_value("color"), Some("blue"));
        assert!(!s.is_important("color"));
        // position of the replaced declaration is kept
        assert_eq!(s.declarations()[4].name, "color");

        s.set_property("color", "", false);
        assert_eq!(s.get_property_value("color"), None);
    }

    #[test]
    fn css_text_marks_priority() {
        let mut s = InlineStyle::default();
        s.set_property("color", "rgb(0, 0, 0)", true);
        s.set_property("width", "10px", false);
        assert_eq!(s.css_text(), "color: rgb(0, 0, 0) !important; width: 10px;");
    }
}
