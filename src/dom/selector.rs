//! CSS selectors, parsed and matched by the same `selectors` engine scraper
//! uses. [`ElementNode`] exposes an arena node to that engine.

use std::fmt;

use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    self, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode,
    NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorList};
use selectors::{Element, NthIndexCache, OpaqueElement};

use crate::errors::LensError;

use super::{DocumentInner, ElementData, NodeId};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed selector group (`a, b c`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    list: SelectorList<Simple>,
    source: String,
}

impl Selector {
    /// # Errors
    ///
    /// Returns [`LensError::Document`] when `source` is not a valid selector
    /// list.
    pub fn parse(source: &str) -> Result<Self, LensError> {
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        SelectorList::parse(&Parser, &mut parser, ParseRelative::No)
            .map(|list| Self {
                list,
                source: source.to_string(),
            })
            .map_err(|e| {
                LensError::Document(format!(
                    "invalid selector `{source}`: {}",
                    SelectorErrorKind::from(e)
                ))
            })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(super) fn matches(&self, doc: &DocumentInner, node: NodeId) -> bool {
        let Some(element) = ElementNode::new(doc, node) else {
            return false;
        };
        let mut cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        matching::matches_selector_list(&self.list, &element, &mut context)
    }
}

/// An element of a [`DocumentInner`], borrowed for the duration of a match.
#[derive(Clone, Copy)]
pub(super) struct ElementNode<'a> {
    doc: &'a DocumentInner,
    id: NodeId,
    data: &'a ElementData,
}

impl fmt::Debug for ElementNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementNode")
            .field("id", &self.id)
            .field("tag", &self.data.tag)
            .finish()
    }
}

impl<'a> ElementNode<'a> {
    fn new(doc: &'a DocumentInner, id: NodeId) -> Option<Self> {
        doc.element(id).map(|data| Self { doc, id, data })
    }

    fn siblings(&self) -> (&'a [NodeId], usize) {
        let siblings = self
            .doc
            .parent(self.id)
            .map(|p| self.doc.child_ids(p))
            .unwrap_or_default();
        let at = siblings
            .iter()
            .position(|&c| c == self.id)
            .unwrap_or(siblings.len());
        (siblings, at)
    }

    fn first_element(doc: &'a DocumentInner, ids: impl Iterator<Item = &'a NodeId>) -> Option<Self> {
        ids.into_iter().find_map(|&id| Self::new(doc, id))
    }
}

/// Never matches non-tree-structural pseudo-classes.
impl Element for ElementNode<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.data)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc
            .parent(self.id)
            .and_then(|parent| Self::new(self.doc, parent))
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
        let (siblings, at) = self.siblings();
        Self::first_element(self.doc, siblings[..at].iter().rev())
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, at) = self.siblings();
        Self::first_element(self.doc, siblings.iter().skip(at + 1))
    }

    fn first_element_child(&self) -> Option<Self> {
        Self::first_element(self.doc, self.doc.child_ids(self.id).iter())
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        *name.0 == *self.data.tag
    }

    fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        &**ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.tag == other.data.tag
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        // attributes here never carry a namespace
        if let NamespaceConstraint::Specific(url) = ns
            && !url.is_empty()
        {
            return false;
        }
        self.data
            .attr(&local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.data.tag == "link"
    }

    fn is_html_slot_element(&self) -> bool {
        self.data.tag == "slot"
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data.attr("class").is_some_and(|list| {
            list.split_whitespace()
                .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
        })
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self
            .doc
            .child_ids(self.id)
            .iter()
            .any(|&child| self.doc.element(child).is_some() || self.doc.has_text(child))
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.id) == Some(self.doc.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn accepts_what_the_page_profiles_use() {
        for source in [
            r#"a.topic-tag#x[href*="topics"]"#,
            "#readme article, article.markdown-body",
            r#"[aria-label="Main content"]"#,
            "div > p",
            "main :not(.skip)",
        ] {
            let sel = Selector::parse(source).unwrap();
            assert_eq!(sel.as_str(), source);
        }
    }

    #[test]
    fn rejects_garbage() {
        for source in ["a[=x]", "a,,b", ".", "div >"] {
            let err = Selector::parse(source).unwrap_err();
            assert!(matches!(err, LensError::Document(msg) if msg.contains(source)));
        }
    }

    #[test]
    fn matches_structural_selectors() {
        let doc = Document::from_html(
            r#"<body><div id="a"><p class="x">one</p><span><p>two</p></span></div>
               <nav aria-label="Main content"><p class="skip">three</p></nav></body>"#,
            None,
        );
        assert_eq!(doc.query_selector_all("div > p").len(), 1);
        assert_eq!(doc.query_selector_all("div p").len(), 2);
        assert_eq!(doc.query_selector_all("p:not(.x)").len(), 2);
        assert_eq!(doc.query_selector_all("p.x + span").len(), 1);
        let nav = doc.query_selector(r#"[aria-label="Main content"]"#).unwrap();
        assert_eq!(doc.tag_name(nav).as_deref(), Some("nav"));
        assert_eq!(doc.query_selector_all("html:root").len(), 1);
    }
}
