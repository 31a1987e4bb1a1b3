//! Selector parsing and matching against the arena DOM.
//!
//! Parsing goes through `scraper`, so the full `selectors` grammar is
//! available: every combinator, attribute operators and the tree-structural
//! pseudo-classes (`:root`, `:first-child`, `:nth-child()`, `:not()`, ...).
//! Pseudo-classes that depend on interaction state and all pseudo-elements
//! fail to parse; a static render can never match them.

use std::fmt;

use scraper::selector::{NonTSPseudoClass, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{self, MatchingContext, MatchingMode, QuirksMode};
use selectors::parser::{self, SelectorImpl};
use selectors::{Element, OpaqueElement};

use crate::dom::{Document, NodeId};

type LocalName = <Simple as SelectorImpl>::LocalName;
type Namespace = <Simple as SelectorImpl>::NamespaceUrl;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// One complex selector such as `table.items > tr td:first-child`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    inner: parser::Selector<Simple>,
}

impl Selector {
    /// Parse a single complex selector. Lists, empty input and anything the
    /// grammar rejects give `None`.
    pub fn parse(text: &str) -> Option<Selector> {
        let list = scraper::Selector::parse(text.trim()).ok()?;
        let mut selectors = list.selectors.into_iter();
        let inner = selectors.next()?;
        selectors.next().is_none().then_some(Selector { inner })
    }

    /// Packed `(ids, classes, types)` specificity; compares like the tuple.
    pub fn specificity(&self) -> u32 {
        self.inner.specificity()
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if !doc.is_element(node) {
            return false;
        }
        let element = ElementRef { doc, node };
        let mut context =
            MatchingContext::new(MatchingMode::Normal, None, None, QuirksMode::NoQuirks);
        matching::matches_selector(&self.inner, 0, None, &element, &mut context, &mut |_, _| {})
    }
}

/// An element of a [`Document`] as `selectors` sees it.
#[derive(Clone, Copy)]
struct ElementRef<'a> {
    doc: &'a Document,
    node: NodeId,
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("node", &self.node)
            .field("tag", &self.doc.tag_name(self.node))
            .finish()
    }
}

impl<'a> ElementRef<'a> {
    fn wrap(&self, node: NodeId) -> Option<Self> {
        self.doc.is_element(node).then_some(ElementRef { doc: self.doc, node })
    }

    fn siblings(&self) -> (&'a [NodeId], usize) {
        let siblings = self
            .doc
            .parent(self.node)
            .map(|p| self.doc.children(p))
            .unwrap_or(&[]);
        let position = siblings
            .iter()
            .position(|&n| n == self.node)
            .unwrap_or(siblings.len());
        (siblings, position)
    }
}

impl<'a> Element for ElementRef<'a> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        match self.doc.kind(self.node) {
            Some(kind) => OpaqueElement::new(kind),
            None => OpaqueElement::new(self.doc),
        }
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc.parent(self.node).and_then(|p| self.wrap(p))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        siblings[..position].iter().rev().find_map(|&n| self.wrap(n))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        siblings
            .get(position + 1..)
            .unwrap_or(&[])
            .iter()
            .find_map(|&n| self.wrap(n))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &LocalName) -> bool {
        self.doc.tag_name(self.node) == Some(&**name)
    }

    fn has_namespace(&self, ns: &Namespace) -> bool {
        ns.is_empty() || &**ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.doc.tag_name(self.node) == other.doc.tag_name(other.node)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &LocalName,
        operation: &AttrSelectorOperation<&String>,
    ) -> bool {
        let no_namespace = match ns {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Specific(url) => url.is_empty(),
        };
        no_namespace
            && self
                .doc
                .attribute(self.node, local_name)
                .map_or(false, |value| operation.eval_str(&value))
    }

    fn match_non_ts_pseudo_class<F>(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<Self::Impl>,
        _flags_setter: &mut F,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        false
    }

    fn is_link(&self) -> bool {
        matches!(self.doc.tag_name(self.node), Some("a" | "area" | "link"))
            && self.doc.attribute(self.node, "href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        self.doc.tag_name(self.node) == Some("slot")
    }

    fn has_id(&self, id: &LocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc
            .attribute(self.node, "id")
            .map_or(false, |v| case_sensitivity.eq(id.as_bytes(), v.as_bytes()))
    }

    fn has_class(&self, name: &LocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc
            .classes(self.node)
            .iter()
            .any(|c| case_sensitivity.eq(name.as_bytes(), c.as_bytes()))
    }

    fn exported_part(&self, _name: &LocalName) -> Option<LocalName> {
        None
    }

    fn imported_part(&self, _name: &LocalName) -> Option<LocalName> {
        None
    }

    fn is_part(&self, _name: &LocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self.doc.children(self.node).iter().any(|&child| {
            self.doc.is_element(child) || self.doc.text(child).map_or(false, |t| !t.is_empty())
        })
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.node) == Some(self.doc.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<html><body><table class="items"><tr><td class="first">0</td><td id="cell" class="num total" data-k="v">1</td></tr></table></body></html>"#,
        )
    }

    #[test]
    fn compound_and_combinators_match() {
        let d = doc();
        let cell = d.get_element_by_id("cell").unwrap();
        for sel in [
            "td",
            "*",
            "#cell",
            ".num.total",
            "table td",
            "tr > td",
            "body table.items td.num",
            "[data-k]",
            "td[data-k=\"v\"]",
            "[data-k^=v]",
            "td.first + td",
            "td.first ~ .num",
            "td:last-child",
            "td:not(.first)",
            "td:nth-child(2)",
        ] {
            let s = Selector::parse(sel).unwrap_or_else(|| panic!("parse {sel}"));
            assert!(s.matches(&d, cell), "{sel} should match");
        }
        for sel in [
            "th",
            "table > td",
            ".missing",
            "[data-k=w]",
            "tr > table td",
            "td:first-child",
            "td + td.first",
        ] {
            let s = Selector::parse(sel).unwrap();
            assert!(!s.matches(&d, cell), "{sel} should not match");
        }
    }

    #[test]
    fn root_pseudo_class_matches_html_only() {
        let d = doc();
        let s = Selector::parse(":root").unwrap();
        assert!(s.matches(&d, d.document_element().unwrap()));
        assert!(!s.matches(&d, d.body().unwrap()));
    }

    #[test]
    fn interaction_state_and_pseudo_elements_are_rejected() {
        for sel in ["a:hover", "p::before", "::after", "input:focus", "", "a, b", "p >"] {
            assert!(Selector::parse(sel).is_none(), "{sel}");
        }
    }

    #[test]
    fn escaped_class_names() {
        let s = Selector::parse(r".w-1\/2").unwrap();
        assert_eq!(s.specificity(), 1 << 10);
        let d = Document::parse(r#"<div id="x" class="w-1/2"></div>"#);
        assert!(s.matches(&d, d.get_element_by_id("x").unwrap()));
    }

    #[test]
    fn specificity_orders_ids_then_classes_then_types() {
        let s = Selector::parse("div#a.b.c > span[x]").unwrap();
        assert_eq!(s.specificity(), (1 << 20) + (3 << 10) + 2);
        let id = Selector::parse("#a").unwrap().specificity();
        let classes = Selector::parse(".a.b.c.d.e.f.g.h.i.j.k").unwrap().specificity();
        assert!(id > classes);
    }
}
