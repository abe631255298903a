//! pagelens - explains the page you are looking at.
//!
//! The crate is a host-independent rendition of a page-explanation browser
//! extension. A page is observed and its main regions highlighted; on request
//! its text (or, on GitHub repository pages, the repository metadata) is sent
//! to the Gemini `generateContent` endpoint and the answer is shown in a
//! floating panel with copy and close controls.
//!
//! # Architecture
//!
//! - [`dom`] is the rendering environment: an in-memory document with
//!   selectors, inline styles, event listeners and mutation observers
//! - [`observer`] keeps landmark regions highlighted as the page changes
//! - [`extract`] turns a document into an [`core::models::ExtractedContent`]
//! - [`clients`] builds the prompt and performs the single HTTP round trip
//! - [`overlay`] owns the one-per-page explanation panel
//! - [`activation`] wires the popup and the install hook to the host
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pagelens::clients::SummaryClient;
//! use pagelens::core::{config::AppConfig, models::ApiCredential};
//! use pagelens::dom::Document;
//! use pagelens::overlay::{MemoryClipboard, OverlayRenderer};
//!
//! #[tokio::main]
//! async fn main() {
//!     pagelens::setup_logging();
//!
//!     let config = AppConfig::from_env();
//!     let document = Document::from_html("<main><p>Hello</p></main>", None);
//!     let renderer = OverlayRenderer::new(Arc::new(MemoryClipboard::new()));
//!     let client = SummaryClient::new(&config);
//!
//!     let panel = pagelens::pipeline::analyze_page(
//!         &document,
//!         &client,
//!         &renderer,
//!         &ApiCredential::new("dummy_key"),
//!     )
//!     .await;
//!     println!("{}", panel.body_text().unwrap_or_default());
//! }
//! ```

pub mod activation;
pub mod clients;
pub mod core;
pub mod dom;
pub mod errors;
pub mod extract;
pub mod observer;
pub mod overlay;
pub mod pipeline;
pub mod prompt;
pub mod storage;

pub use errors::LensError;

/// Configure structured JSON logging filtered by `RUST_LOG` (default `info`).
///
/// Calling it again after a subscriber is installed is a no-op.
///
/// # Example
///
/// ```
/// pagelens::setup_logging();
/// pagelens::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
