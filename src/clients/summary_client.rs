//! Summary Client: one `generateContent` round trip per explanation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::core::config::AppConfig;
use crate::core::models::{ApiCredential, ExtractedContent};
use crate::errors::LensError;
use crate::prompt::build_prompt;

/// Shown when a failed response carries no `error.message`.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate the explanation";

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`LensError::RemoteService`] for a failed or malformed
    /// response and [`LensError::Http`] when the request cannot be sent.
    async fn summarize(
        &self,
        content: &ExtractedContent,
        credential: &ApiCredential,
    ) -> Result<String, LensError>;
}

pub struct SummaryClient {
    http: Client,
    endpoint: String,
    language: String,
}

impl SummaryClient {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self::with_endpoint(config.endpoint(), config.language.clone())
    }

    #[must_use]
    pub fn with_endpoint(endpoint: String, language: String) -> Self {
        Self {
            http: Client::new(),
            endpoint,
            language,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `prompt` as-is and return the first candidate's first text part.
    ///
    /// # Errors
    ///
    /// See [`Summarizer::summarize`].
    pub async fn generate(
        &self,
        prompt: &str,
        credential: &ApiCredential,
    ) -> Result<String, LensError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![TextPart { text: prompt }],
            }],
        };

        #[cfg(feature = "debug-logs")]
        info!("Using prompt:\n{}", prompt);

        #[cfg(not(feature = "debug-logs"))]
        info!("Requesting explanation ({} prompt chars)", prompt.chars().count());

        // The URL carries the key, so errors are stripped of it.
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", credential.expose())])
            .json(&body)
            .send()
            .await
            .map_err(|e| LensError::from(e.without_url()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LensError::from(e.without_url()))?;

        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            error!("Summary endpoint returned {}: {}", status, message);
            return Err(LensError::RemoteService(message));
        }

        parse_summary(&text)
    }
}

#[async_trait]
impl Summarizer for SummaryClient {
    async fn summarize(
        &self,
        content: &ExtractedContent,
        credential: &ApiCredential,
    ) -> Result<String, LensError> {
        let prompt = build_prompt(content, &self.language);
        self.generate(&prompt, credential).await
    }
}

/// `error.message` from an error body, if the body is JSON and has one.
#[must_use]
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// `candidates[0].content.parts[0].text` from a success body.
///
/// # Errors
///
/// Returns [`LensError::RemoteService`] when the body is not JSON or lacks
/// that path.
pub fn parse_summary(body: &str) -> Result<String, LensError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| LensError::RemoteService(format!("Failed to parse response: {e}")))?;
    value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LensError::RemoteService("No text in response".to_string()))
}
