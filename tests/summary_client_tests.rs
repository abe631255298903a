use pagelens::LensError;
use pagelens::clients::summary_client::GENERIC_FAILURE_MESSAGE;
use pagelens::clients::{Summarizer, SummaryClient};
use pagelens::core::config::AppConfig;
use pagelens::core::models::{ApiCredential, ExtractedContent, PageContent};
use serde_json::{Value, json};
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

const ENDPOINT_PATH: &str = "/v1/models/gemini-pro:generateContent";

fn client_for(server: &MockServer) -> SummaryClient {
    let base = format!("{}/v1", server.uri());
    let config = AppConfig::from_lookup(|key| match key {
        "PAGELENS_ENDPOINT" => Some(base.clone()),
        _ => None,
    });
    SummaryClient::new(&config)
}

fn sample_content() -> ExtractedContent {
    ExtractedContent::Page(PageContent {
        title: "Release notes".into(),
        description: "What changed".into(),
        headings: vec!["v2.0".into()],
        body: "Faster builds.".into(),
    })
}

#[tokio::test]
async fn success_returns_first_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path(ENDPOINT_PATH))
        .and(matchers::query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "First" }, { "text": "ignored" }] } },
                { "content": { "parts": [{ "text": "Second candidate" }] } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = client_for(&server)
        .summarize(&sample_content(), &ApiCredential::new("test-key"))
        .await
        .unwrap();
    assert_eq!(summary, "First");
}

#[tokio::test]
async fn request_carries_prompt_in_contents_parts() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .summarize(&sample_content(), &ApiCredential::new("k"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    let prompt = contents[0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Page title: Release notes"));
    assert!(prompt.contains("Faster builds."));
    assert!(prompt.contains("Value and usefulness"));
}

#[tokio::test]
async fn error_body_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({ "error": { "message": "quota exceeded" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .summarize(&sample_content(), &ApiCredential::new("k"))
        .await
        .unwrap_err();
    match err {
        LensError::RemoteService(message) => assert_eq!(message, "quota exceeded"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn error_without_message_uses_generic_text() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .summarize(&sample_content(), &ApiCredential::new("k"))
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::RemoteService(m) if m == GENERIC_FAILURE_MESSAGE));
}

#[tokio::test]
async fn malformed_success_body_is_a_service_error() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .summarize(&sample_content(), &ApiCredential::new("k"))
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::RemoteService(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_an_http_error_without_the_key() {
    let client = SummaryClient::with_endpoint(
        "http://127.0.0.1:9/v1/models/gemini-pro:generateContent".to_string(),
        "English".to_string(),
    );
    let err = client
        .summarize(&sample_content(), &ApiCredential::new("very-secret"))
        .await
        .unwrap_err();
    match err {
        LensError::Http(message) => assert!(!message.contains("very-secret")),
        other => panic!("unexpected error: {other:?}"),
    }
}
