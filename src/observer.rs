//! Page Observer: keeps "main" regions of the page visually highlighted while
//! the page mutates underneath.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::dom::{Document, MutationRecord, NodeId, ObserveOptions, ObserverId, Selector};
use crate::errors::LensError;

/// Class added to every element the observer has styled.
pub const HIGHLIGHT_MARKER: &str = "pagelens-highlight";

#[derive(Debug, Clone)]
pub struct HighlightProfile {
    pub name: &'static str,
    pub selector: Selector,
    pub style: Vec<(&'static str, &'static str)>,
}

impl HighlightProfile {
    /// Card regions of GitHub's repository sidebar.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the selector is a constant.
    pub fn github() -> Result<Self, LensError> {
        Ok(Self {
            name: "github",
            selector: Selector::parse(".BorderGrid-cell")?,
            style: vec![
                ("background-color", "#f6f8fa"),
                ("padding", "10px"),
                ("margin", "5px 0"),
                ("border-radius", "6px"),
            ],
        })
    }

    /// Landmark regions on any other page.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the selector is a constant.
    pub fn generic() -> Result<Self, LensError> {
        Ok(Self {
            name: "generic",
            selector: Selector::parse(r#"article, main, [role="main"]"#)?,
            style: vec![
                ("outline", "2px solid rgba(83, 155, 245, 0.35)"),
                ("outline-offset", "4px"),
                ("border-radius", "6px"),
            ],
        })
    }

    /// # Errors
    ///
    /// Never fails in practice; the selectors are constants.
    pub fn for_url(url: Option<&Url>) -> Result<Self, LensError> {
        let on_github = url
            .and_then(Url::host_str)
            .is_some_and(|host| host.eq_ignore_ascii_case("github.com"));
        if on_github {
            Self::github()
        } else {
            Self::generic()
        }
    }
}

/// Style every unmarked element matching the profile, then mark it.
/// Returns how many elements were newly styled; zero on an unchanged page.
pub fn highlight_pass(document: &Document, profile: &HighlightProfile) -> usize {
    let fresh: Vec<NodeId> = document
        .select_all(&profile.selector)
        .into_iter()
        .filter(|&node| !document.has_class(node, HIGHLIGHT_MARKER))
        .collect();

    for &node in &fresh {
        for (property, value) in &profile.style {
            document.set_style_property(node, property, value);
        }
        document.add_class(node, HIGHLIGHT_MARKER);
    }

    if !fresh.is_empty() {
        debug!(
            "Highlighted {} element(s) with the {} profile",
            fresh.len(),
            profile.name
        );
    }
    fresh.len()
}

/// Live registration of the highlight pass on a document.
#[derive(Debug)]
pub struct PageObserver {
    document: Document,
    observer: ObserverId,
}

impl PageObserver {
    /// Run one pass now and re-run it after every batch of child-list
    /// mutations anywhere in the body.
    #[must_use]
    pub fn attach(document: &Document, profile: HighlightProfile) -> Self {
        highlight_pass(document, &profile);
        let body = document.body();
        let profile = Arc::new(profile);
        let observer = document.observe(
            body,
            ObserveOptions {
                child_list: true,
                attributes: false,
                subtree: true,
            },
            Arc::new(move |doc: &Document, records: &[MutationRecord]| {
                if records.iter().any(|r| r.is_child_list()) {
                    highlight_pass(doc, &profile);
                }
            }),
        );
        Self {
            document: document.clone(),
            observer,
        }
    }

    /// Pick the profile from the document URL and attach.
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in profile selector fails to parse.
    pub fn attach_for_page(document: &Document) -> Result<Self, LensError> {
        let profile = HighlightProfile::for_url(document.url().as_ref())?;
        Ok(Self::attach(document, profile))
    }

    /// Stop observing. Page teardown makes this unnecessary in a browser.
    pub fn detach(self) {
        self.document.disconnect(self.observer);
    }
}
