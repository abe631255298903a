//! Content Extractor: derives a bounded text bundle describing the page.

use std::collections::BTreeSet;

use tracing::debug;
use url::Url;

use crate::core::models::{ExtractedContent, PageContent, RepositoryContent};
use crate::dom::Document;

/// Cap on the fallback body text, in characters.
pub const MAX_BODY_CHARS: usize = 5000;

/// Landmarks tried in order; the first match supplies the body.
pub const MAIN_CONTENT_SELECTORS: [&str; 5] =
    ["article", "main", ".main", "#main", r#"[role="main"]"#];

const REPO_NAME_SELECTORS: &[&str] = &[
    r#"strong[itemprop="name"] a"#,
    r#"[itemprop="name"]"#,
    r#"#repository-container-header strong a"#,
];
const REPO_DESCRIPTION_SELECTORS: &[&str] = &[
    ".BorderGrid-cell p.f4",
    r#"[itemprop="about"]"#,
    r#"meta[property="og:description"]"#,
];
const REPO_README_SELECTORS: &[&str] = &["#readme article", "article.markdown-body", "#readme"];
const REPO_TOPIC_SELECTOR: &str = "a.topic-tag";
const REPO_LANGUAGE_SELECTOR: &str = r#"a[href*="search?l="] span.text-bold"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Repository,
    Generic,
}

impl PageKind {
    /// `https://github.com/<owner>/<repo>` is a repository page; anything
    /// deeper (issues, blobs) or elsewhere is generic.
    #[must_use]
    pub fn classify(url: Option<&Url>) -> Self {
        match url.and_then(repository_slug) {
            Some(_) => PageKind::Repository,
            None => PageKind::Generic,
        }
    }
}

fn repository_slug(url: &Url) -> Option<String> {
    if !url
        .host_str()
        .is_some_and(|h| h.eq_ignore_ascii_case("github.com"))
    {
        return None;
    }
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [owner, repo] => Some(format!("{owner}/{repo}")),
        _ => None,
    }
}

/// First `limit` characters of `text`, never splitting a character.
#[must_use]
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[must_use]
pub fn extract(document: &Document) -> ExtractedContent {
    let url = document.url();
    match PageKind::classify(url.as_ref()) {
        PageKind::Repository => ExtractedContent::Repository(extract_repository(document)),
        PageKind::Generic => ExtractedContent::Page(extract_page(document)),
    }
}

#[must_use]
pub fn extract_page(document: &Document) -> PageContent {
    let description = document
        .query_selector(r#"meta[name="description"]"#)
        .and_then(|meta| document.attribute(meta, "content"))
        .unwrap_or_default();

    let headings = document
        .query_selector_all("h1")
        .into_iter()
        .map(|h| document.inner_text(h))
        .collect();

    PageContent {
        title: document.title(),
        description,
        headings,
        body: main_content(document),
    }
}

/// Text of the highest-priority landmark, or the page's visible text cut to
/// [`MAX_BODY_CHARS`].
#[must_use]
pub fn main_content(document: &Document) -> String {
    for selector in MAIN_CONTENT_SELECTORS {
        if let Some(node) = document.query_selector(selector) {
            debug!("Main content found via `{}`", selector);
            return document.inner_text(node);
        }
    }
    debug!("No landmark found, falling back to body text");
    let text = document.inner_text(document.body());
    truncate_chars(&text, MAX_BODY_CHARS).to_string()
}

fn first_text(document: &Document, selectors: &[&str]) -> String {
    for selector in selectors {
        if let Some(node) = document.query_selector(selector) {
            // meta tags carry their text in `content`
            let text = match document.tag_name(node).as_deref() {
                Some("meta") => document.attribute(node, "content").unwrap_or_default(),
                _ => document.inner_text(node),
            };
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

#[must_use]
pub fn extract_repository(document: &Document) -> RepositoryContent {
    let mut name = first_text(document, REPO_NAME_SELECTORS);
    if name.is_empty()
        && let Some(slug) = document.url().as_ref().and_then(repository_slug)
    {
        name = slug;
    }

    let topics: BTreeSet<String> = document
        .query_selector_all(REPO_TOPIC_SELECTOR)
        .into_iter()
        .map(|n| document.inner_text(n))
        .filter(|t| !t.is_empty())
        .collect();

    let mut languages: Vec<String> = Vec::new();
    for node in document.query_selector_all(REPO_LANGUAGE_SELECTOR) {
        let language = document.inner_text(node);
        if !language.is_empty() && !languages.contains(&language) {
            languages.push(language);
        }
    }

    RepositoryContent {
        name,
        description: first_text(document, REPO_DESCRIPTION_SELECTORS),
        readme: first_text(document, REPO_README_SELECTORS),
        topics,
        languages,
    }
}
