use crate::core::models::{ExtractedContent, PageContent, RepositoryContent};

/// The four parts every explanation must cover, in order.
pub const EXPLANATION_SECTIONS: [&str; 4] = [
    "Overview and purpose",
    "Main topics and content",
    "Important points and notable features",
    "Value and usefulness",
];

/// Upper bound on the README excerpt embedded in a repository prompt.
pub const MAX_README_CHARS: usize = 8000;

/// Remove control characters other than line breaks and tabs. Page text is
/// inserted verbatim otherwise.
#[must_use]
pub fn sanitize_page_text(raw: &str) -> String {
    raw.chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
        .collect()
}

fn sections_block() -> String {
    EXPLANATION_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn build_prompt(content: &ExtractedContent, language: &str) -> String {
    match content {
        ExtractedContent::Page(page) => build_page_prompt(page, language),
        ExtractedContent::Repository(repo) => build_repository_prompt(repo, language),
    }
}

#[must_use]
pub fn build_page_prompt(page: &PageContent, language: &str) -> String {
    format!(
        "Explain the following web page clearly in {language}.\n\
         \n\
         Page title: {title}\n\
         Description: {description}\n\
         Headings: {headings}\n\
         \n\
         Page content:\n\
         {body}\n\
         \n\
         The explanation must include the following sections:\n\
         {sections}",
        title = sanitize_page_text(&page.title),
        description = sanitize_page_text(&page.description),
        headings = sanitize_page_text(&page.headings.join("\n")),
        body = sanitize_page_text(&page.body),
        sections = sections_block(),
    )
}

#[must_use]
pub fn build_repository_prompt(repo: &RepositoryContent, language: &str) -> String {
    let topics = repo.topics.iter().cloned().collect::<Vec<_>>().join(", ");
    let readme = crate::extract::truncate_chars(&repo.readme, MAX_README_CHARS);
    format!(
        "Explain the following GitHub repository clearly in {language}.\n\
         \n\
         Repository: {name}\n\
         Description: {description}\n\
         Topics: {topics}\n\
         Languages: {languages}\n\
         \n\
         README:\n\
         {readme}\n\
         \n\
         The explanation must include the following sections:\n\
         {sections}",
        name = sanitize_page_text(&repo.name),
        description = sanitize_page_text(&repo.description),
        topics = sanitize_page_text(&topics),
        languages = sanitize_page_text(&repo.languages.join(", ")),
        readme = sanitize_page_text(readme),
        sections = sections_block(),
    )
}
