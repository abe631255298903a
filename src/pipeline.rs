//! The page pipeline: extract, summarize, render. This is the unit a host
//! runs inside a page when the user asks for an explanation.

use tracing::info;

use crate::clients::Summarizer;
use crate::core::models::{ApiCredential, ExtractedContent};
use crate::dom::Document;
use crate::extract::extract;
use crate::overlay::{OverlayPanel, OverlayRenderer};

/// Show the loading panel, request an explanation and fill the panel with
/// the summary or the error. The panel never stays in the loading state once
/// this returns.
///
/// Content is extracted after the previous panel is gone and before the new
/// one goes in, so the panel's own text never reaches the prompt.
pub async fn analyze_page(
    document: &Document,
    summarizer: &dyn Summarizer,
    renderer: &OverlayRenderer,
    credential: &ApiCredential,
) -> OverlayPanel {
    renderer.clear(document);
    let content = extract(document);
    let panel = renderer.open(document);

    match &content {
        ExtractedContent::Page(page) => info!(
            "Explaining page \"{}\" ({} body chars, {} headings)",
            page.title,
            page.body.chars().count(),
            page.headings.len()
        ),
        ExtractedContent::Repository(repo) => info!(
            "Explaining repository {} ({} topics, {} languages)",
            repo.name,
            repo.topics.len(),
            repo.languages.len()
        ),
    }

    // Let observers see the loading panel before suspending on the request.
    document.deliver_mutations();

    let result = summarizer.summarize(&content, credential).await;
    if panel.show(result) {
        document.deliver_mutations();
    }
    panel
}
