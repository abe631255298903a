use std::sync::Arc;

use async_trait::async_trait;
use pagelens::LensError;
use pagelens::activation::{
    ExtensionHost, LocalHost, MISSING_KEY_ALERT, PageRunner, Popup, PopupView, TabId,
    on_installed,
};
use pagelens::clients::{Summarizer, SummaryClient};
use pagelens::core::models::{ApiCredential, ExtractedContent};
use pagelens::dom::Document;
use pagelens::overlay::{MemoryClipboard, OverlayRenderer};
use pagelens::storage::{CredentialStore, MemoryCredentialStore};
use parking_lot::Mutex;
use serde_json::json;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

const TAB: TabId = TabId(7);

/// Records the credential of every call and answers with a fixed summary.
#[derive(Default)]
struct RecordingSummarizer {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(
        &self,
        _content: &ExtractedContent,
        credential: &ApiCredential,
    ) -> Result<String, LensError> {
        self.seen.lock().push(credential.expose().to_string());
        Ok("summary".to_string())
    }
}

struct Harness {
    store: Arc<MemoryCredentialStore>,
    host: Arc<LocalHost>,
    runner: Arc<PageRunner>,
    summarizer: Arc<RecordingSummarizer>,
    popup: Popup,
}

fn harness(store: MemoryCredentialStore) -> Harness {
    let store = Arc::new(store);
    let host = Arc::new(LocalHost::new(TAB, true));
    let summarizer = Arc::new(RecordingSummarizer::default());
    let renderer = OverlayRenderer::new(Arc::new(MemoryClipboard::new()));
    let runner = Arc::new(PageRunner::new(summarizer.clone(), renderer));
    runner.insert(
        TAB,
        Document::from_html("<body><main>hello</main></body>", None),
    );
    let popup = Popup::new(store.clone(), host.clone(), runner.clone());
    Harness {
        store,
        host,
        runner,
        summarizer,
        popup,
    }
}

#[tokio::test]
async fn popup_opens_on_key_entry_without_a_stored_key() {
    let mut h = harness(MemoryCredentialStore::new());
    assert_eq!(h.popup.open().await.unwrap(), PopupView::KeyEntry);

    let mut h2 = harness(MemoryCredentialStore::with_credential(ApiCredential::new("k")));
    assert_eq!(h2.popup.open().await.unwrap(), PopupView::Main);
    assert_eq!(h.popup.view(), PopupView::KeyEntry);
}

#[tokio::test]
async fn any_non_empty_key_is_stored_verbatim_and_triggers_a_run() {
    for input in ["abc", "  padded  ", " ", "ключ-🔑"] {
        let mut h = harness(MemoryCredentialStore::new());
        h.popup.open().await.unwrap();

        h.popup.submit_key(input).await.unwrap();

        assert_eq!(h.store.get().await.unwrap().unwrap().expose(), input);
        assert_eq!(h.popup.view(), PopupView::Main);
        assert!(!h.popup.key_error_visible());
        assert_eq!(*h.summarizer.seen.lock(), vec![input.to_string()]);

        let doc = h.runner.document(TAB).unwrap();
        let panel = h.runner.renderer().current(&doc).unwrap();
        assert_eq!(panel.body_text().as_deref(), Some("summary"));
    }
}

#[tokio::test]
async fn empty_key_is_rejected_without_touching_storage() {
    let mut h = harness(MemoryCredentialStore::new());
    h.popup.open().await.unwrap();

    let err = h.popup.submit_key("").await.unwrap_err();

    assert!(matches!(err, LensError::EmptyCredentialInput));
    assert!(h.popup.key_error_visible());
    assert_eq!(h.popup.view(), PopupView::KeyEntry);
    assert_eq!(h.store.writes(), 0);
    assert!(h.store.get().await.unwrap().is_none());
    assert!(h.summarizer.seen.lock().is_empty());
}

#[tokio::test]
async fn error_flag_clears_after_a_valid_key() {
    let mut h = harness(MemoryCredentialStore::new());
    let _ = h.popup.submit_key("").await;
    assert!(h.popup.key_error_visible());
    h.popup.submit_key("real").await.unwrap();
    assert!(!h.popup.key_error_visible());
}

#[tokio::test]
async fn explain_without_key_alerts_and_does_nothing_else() {
    let mut h = harness(MemoryCredentialStore::new());

    let err = h.popup.explain().await.unwrap_err();

    assert!(matches!(err, LensError::MissingCredential));
    assert_eq!(h.host.alerts(), vec![MISSING_KEY_ALERT.to_string()]);
    assert!(h.summarizer.seen.lock().is_empty());
    let doc = h.runner.document(TAB).unwrap();
    assert!(h.runner.renderer().current(&doc).is_none());
}

#[tokio::test]
async fn explain_uses_the_stored_key() {
    let mut h = harness(MemoryCredentialStore::with_credential(ApiCredential::new(
        "stored",
    )));
    h.popup.explain().await.unwrap();
    assert_eq!(*h.summarizer.seen.lock(), vec!["stored".to_string()]);
    assert!(h.host.alerts().is_empty());
}

#[tokio::test]
async fn unknown_tab_is_a_host_error() {
    let store = Arc::new(MemoryCredentialStore::with_credential(ApiCredential::new("k")));
    let host = Arc::new(LocalHost::new(TabId(99), true));
    let runner = Arc::new(PageRunner::new(
        Arc::new(RecordingSummarizer::default()),
        OverlayRenderer::new(Arc::new(MemoryClipboard::new())),
    ));
    let mut popup = Popup::new(store, host, runner);

    let err = popup.explain().await.unwrap_err();
    assert!(matches!(err, LensError::Host(_)));
}

#[tokio::test]
async fn install_hook_reenables_a_disabled_extension() {
    let host = LocalHost::new(TAB, false);
    assert!(on_installed(&host).await.unwrap());
    assert!(host.is_enabled().await.unwrap());
}

#[tokio::test]
async fn key_entry_through_to_rendered_summary() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/models/gemini-pro:generateContent"))
        .and(matchers::query_param("key", "user-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "This page greets you." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SummaryClient::with_endpoint(
        format!("{}/v1/models/gemini-pro:generateContent", server.uri()),
        "English".to_string(),
    );
    let runner = Arc::new(PageRunner::new(
        Arc::new(client),
        OverlayRenderer::new(Arc::new(MemoryClipboard::new())),
    ));
    let doc = Document::from_html(
        "<html><head><title>Hi</title></head><body><article>Hello there</article></body></html>",
        None,
    );
    runner.insert(TAB, doc.clone());

    let store = Arc::new(MemoryCredentialStore::new());
    let mut popup = Popup::new(
        store.clone(),
        Arc::new(LocalHost::new(TAB, true)),
        runner.clone(),
    );
    assert_eq!(popup.open().await.unwrap(), PopupView::KeyEntry);
    popup.submit_key("user-key").await.unwrap();

    let panel = runner.renderer().current(&doc).unwrap();
    assert_eq!(panel.body_text().as_deref(), Some("This page greets you."));
    assert_eq!(store.writes(), 1);
}
