//! Loading documents from HTML source.

use scraper::{Html, Node};
use url::Url;

use super::Document;

impl Document {
    /// Parse `source` as a full HTML document. Comments, doctypes and
    /// processing instructions are dropped; everything else keeps its
    /// document order.
    #[must_use]
    pub fn from_html(source: &str, url: Option<Url>) -> Self {
        let parsed = Html::parse_document(source);
        Document::build(url, |builder| {
            let mut stack = vec![(parsed.tree.root(), builder.root())];
            while let Some((node, parent)) = stack.pop() {
                for child in node.children() {
                    match child.value() {
                        Node::Element(element) => {
                            let attrs: Vec<(&str, &str)> = element.attrs().collect();
                            let id = builder.element(parent, element.name(), &attrs);
                            stack.push((child, id));
                        }
                        Node::Text(text) => builder.text(parent, text),
                        _ => {}
                    }
                }
            }
        })
    }
}
