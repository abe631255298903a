use std::collections::BTreeSet;

use pagelens::core::models::{ExtractedContent, PageContent, RepositoryContent};
use pagelens::prompt::{
    EXPLANATION_SECTIONS, MAX_README_CHARS, build_prompt, sanitize_page_text,
};

#[test]
fn test_sanitize_page_text_keeps_layout() {
    let input = "Line one\n\tindented \u{0000}line\u{007F} two";
    assert_eq!(sanitize_page_text(input), "Line one\n\tindented line two");
}

#[test]
fn test_page_prompt_lists_every_section_in_order() {
    let content = ExtractedContent::Page(PageContent {
        title: "Docs".into(),
        description: String::new(),
        headings: vec!["Intro".into()],
        body: "Body text".into(),
    });
    let prompt = build_prompt(&content, "English");

    assert!(prompt.contains("in English"));
    assert!(prompt.contains("Page title: Docs"));
    assert!(prompt.contains("Body text"));

    let mut last = 0;
    for (i, section) in EXPLANATION_SECTIONS.iter().enumerate() {
        let line = format!("{}. {}", i + 1, section);
        let at = prompt.find(&line).unwrap_or_else(|| panic!("missing {line}"));
        assert!(at >= last);
        last = at;
    }
}

#[test]
fn test_repository_prompt_truncates_readme() {
    let repo = RepositoryContent {
        name: "owner/tool".into(),
        description: "A tool".into(),
        readme: "r".repeat(MAX_README_CHARS + 500),
        topics: BTreeSet::from(["cli".to_string(), "rust".to_string()]),
        languages: vec!["Rust".into()],
    };
    let prompt = build_prompt(&ExtractedContent::Repository(repo), "Japanese");

    assert!(prompt.contains("in Japanese"));
    assert!(prompt.contains("Repository: owner/tool"));
    assert!(prompt.contains("Topics: cli, rust"));
    assert!(prompt.contains(&"r".repeat(MAX_README_CHARS)));
    assert!(!prompt.contains(&"r".repeat(MAX_README_CHARS + 1)));
}
