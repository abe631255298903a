//! Overlay Renderer: the floating explanation panel.
//!
//! A document holds at most one panel. [`OverlayRenderer::open`] removes any
//! previous panel and its stylesheet (see [`OverlayRenderer::clear`]) before
//! inserting a fresh one in the loading state; [`OverlayPanel::show`] swaps the loading markup for the
//! result and binds the copy and close controls again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::models::SummaryResult;
use crate::dom::{Document, NodeId};
use crate::errors::LensError;

pub const PANEL_CLASS: &str = "pagelens-analysis";
pub const STYLESHEET_ID: &str = "pagelens-analysis-style";
pub const CONTENT_CLASS: &str = "pagelens-analysis-content";
pub const COPY_BUTTON_CLASS: &str = "pagelens-copy-button";
pub const CLOSE_BUTTON_CLASS: &str = "pagelens-close-button";

pub const LOADING_MESSAGE: &str = "Generating explanation...";
pub const RESULT_TITLE: &str = "Page explanation";
pub const COPY_LABEL: &str = "Copy explanation";
pub const COPIED_LABEL: &str = "Copied!";
pub const ERROR_PREFIX: &str = "An error occurred while generating the explanation";

/// How long the copy button shows [`COPIED_LABEL`].
pub const COPY_CONFIRMATION: Duration = Duration::from_secs(2);

const COPY_COLOR: &str = "#347d39";
const COPY_HOVER_COLOR: &str = "#46954a";

const PANEL_STYLE: &[(&str, &str)] = &[
    ("position", "fixed"),
    ("top", "20px"),
    ("right", "20px"),
    ("width", "400px"),
    ("max-height", "80vh"),
    ("overflow-y", "auto"),
    ("padding", "20px"),
    ("background-color", "#1c2128"),
    ("color", "#adbac7"),
    ("border", "1px solid #444c56"),
    ("border-radius", "6px"),
    ("box-shadow", "0 4px 6px rgba(0, 0, 0, 0.2)"),
    ("z-index", "9999"),
    ("font-size", "14px"),
    ("line-height", "1.6"),
];

const STYLESHEET: &str = "
.pagelens-analysis::-webkit-scrollbar { width: 8px; }
.pagelens-analysis::-webkit-scrollbar-track { background: #2d333b; border-radius: 4px; }
.pagelens-analysis::-webkit-scrollbar-thumb { background: #444c56; border-radius: 4px; }
.pagelens-analysis::-webkit-scrollbar-thumb:hover { background: #539bf5; }
.pagelens-close-button {
  display: flex; align-items: center; justify-content: center;
  width: 24px; height: 24px; border: none; background: none;
  color: #768390; font-size: 16px; cursor: pointer; border-radius: 4px;
  transition: all 0.2s ease;
}
.pagelens-close-button:hover { background-color: #2d333b; color: #539bf5; }
";

/// System clipboard capability supplied by the host.
#[async_trait]
pub trait Clipboard: Send + Sync {
    /// # Errors
    ///
    /// Returns [`LensError::ClipboardWrite`] when the host refuses the write.
    async fn write_text(&self, text: &str) -> Result<(), LensError>;
}

/// Clipboard kept in process memory. `failing()` builds one that rejects
/// every write.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    fail: bool,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            contents: Mutex::new(None),
            fail: true,
        }
    }

    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), LensError> {
        if self.fail {
            return Err(LensError::ClipboardWrite("permission denied".to_string()));
        }
        *self.contents.lock() = Some(text.to_string());
        Ok(())
    }
}

#[derive(Clone)]
pub struct OverlayRenderer {
    clipboard: Arc<dyn Clipboard>,
}

impl OverlayRenderer {
    pub fn new(clipboard: Arc<dyn Clipboard>) -> Self {
        Self { clipboard }
    }

    /// The panel currently attached to `document`, if any.
    #[must_use]
    pub fn current(&self, document: &Document) -> Option<OverlayPanel> {
        let panel = document.query_selector(&format!(".{PANEL_CLASS}"))?;
        let stylesheet = document.get_element_by_id(STYLESHEET_ID)?;
        Some(OverlayPanel {
            document: document.clone(),
            panel,
            stylesheet,
            clipboard: Arc::clone(&self.clipboard),
        })
    }

    /// Remove any panel and stylesheet left in `document`.
    pub fn clear(&self, document: &Document) {
        for stale in document.query_selector_all(&format!(".{PANEL_CLASS}")) {
            debug!("Removing previous explanation panel");
            document.remove(stale);
        }
        if let Some(style) = document.get_element_by_id(STYLESHEET_ID) {
            document.remove(style);
        }
    }

    /// Replace any existing panel with a new one in the loading state.
    #[must_use]
    pub fn open(&self, document: &Document) -> OverlayPanel {
        self.clear(document);

        let panel = document.create_element("div");
        document.set_attribute(panel, "class", PANEL_CLASS);
        for (property, value) in PANEL_STYLE {
            document.set_style_property(panel, property, value);
        }

        let heading = document.append_element(
            panel,
            "h3",
            &[("style", "color: #539bf5; margin: 0 0 15px 0;")],
        );
        document.set_text(heading, &format!("🔄 {LOADING_MESSAGE}"));

        let stylesheet = document.create_element("style");
        document.set_attribute(stylesheet, "id", STYLESHEET_ID);
        document.set_text(stylesheet, STYLESHEET);
        document.append_child(document.head(), stylesheet);

        let overlay = OverlayPanel {
            document: document.clone(),
            panel,
            stylesheet,
            clipboard: Arc::clone(&self.clipboard),
        };

        let close = document.append_element(
            panel,
            "button",
            &[
                ("class", CLOSE_BUTTON_CLASS),
                ("style", "position: absolute; top: 10px; right: 10px;"),
            ],
        );
        document.set_text(close, "❌");
        overlay.bind_close(close);

        document.append_child(document.body(), panel);
        overlay
    }
}

#[derive(Clone)]
pub struct OverlayPanel {
    document: Document,
    panel: NodeId,
    stylesheet: NodeId,
    clipboard: Arc<dyn Clipboard>,
}

impl std::fmt::Debug for OverlayPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayPanel")
            .field("panel", &self.panel)
            .field("stylesheet", &self.stylesheet)
            .finish_non_exhaustive()
    }
}

impl OverlayPanel {
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.panel
    }

    #[must_use]
    pub fn stylesheet(&self) -> NodeId {
        self.stylesheet
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.document.is_connected(self.panel)
    }

    fn find(&self, class: &str) -> Option<NodeId> {
        let selector = crate::dom::Selector::parse(&format!(".{class}")).ok()?;
        self.document.select_first_within(self.panel, &selector)
    }

    #[must_use]
    pub fn copy_button(&self) -> Option<NodeId> {
        self.find(COPY_BUTTON_CLASS)
    }

    #[must_use]
    pub fn close_button(&self) -> Option<NodeId> {
        self.find(CLOSE_BUTTON_CLASS)
    }

    /// Text of the result block, once a result has been shown.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        self.find(CONTENT_CLASS)
            .map(|content| self.document.text_content(content))
    }

    /// Everything the panel currently displays.
    #[must_use]
    pub fn visible_text(&self) -> String {
        self.document.text_content(self.panel)
    }

    /// Replace the loading markup with the summary or an error message.
    /// Returns false when the panel was closed in the meantime and the result
    /// was dropped.
    pub fn show(&self, result: SummaryResult) -> bool {
        if !self.is_open() {
            info!("Explanation panel was closed before the result arrived; discarding it");
            return false;
        }

        let text = match result {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Showing explanation error in panel: {}", e);
                format!("{ERROR_PREFIX}: {e}")
            }
        };

        let doc = &self.document;
        doc.clear_children(self.panel);

        let header = doc.append_element(
            self.panel,
            "div",
            &[(
                "style",
                "display: flex; justify-content: space-between; align-items: center; margin-bottom: 15px;",
            )],
        );
        let title = doc.append_element(header, "h3", &[("style", "color: #539bf5; margin: 0;")]);
        doc.set_text(title, &format!("🎯 {RESULT_TITLE}"));

        let copy = doc.append_element(
            header,
            "button",
            &[
                ("class", COPY_BUTTON_CLASS),
                (
                    "style",
                    "padding: 8px 16px; background-color: #347d39; color: #ffffff; border: none; border-radius: 6px; cursor: pointer; font-size: 12px;",
                ),
            ],
        );
        doc.set_text(copy, COPY_LABEL);

        let close = doc.append_element(
            header,
            "button",
            &[("class", CLOSE_BUTTON_CLASS), ("style", "position: static;")],
        );
        doc.set_text(close, "❌");

        let content = doc.append_element(
            self.panel,
            "div",
            &[
                ("class", CONTENT_CLASS),
                ("style", "white-space: pre-wrap; color: #adbac7;"),
            ],
        );
        doc.set_text(content, &text);

        self.bind_copy(copy);
        self.bind_close(close);
        true
    }

    /// Remove the panel and its stylesheet. Safe to call twice.
    pub fn close(&self) {
        self.document.remove(self.panel);
        self.document.remove(self.stylesheet);
        debug!("Explanation panel closed");
    }

    /// Copy the shown text and flash [`COPIED_LABEL`] on the copy button for
    /// [`COPY_CONFIRMATION`]. Must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LensError::ClipboardWrite`] if the clipboard rejects the
    /// write; the button label is left untouched in that case.
    pub async fn copy(&self) -> Result<(), LensError> {
        let Some(text) = self.body_text() else {
            debug!("Nothing to copy yet");
            return Ok(());
        };

        if let Err(e) = self.clipboard.write_text(&text).await {
            error!("Failed to copy explanation: {}", e);
            return Err(e);
        }

        let Some(button) = self.copy_button() else {
            return Ok(());
        };
        self.document.set_text(button, COPIED_LABEL);

        let document = self.document.clone();
        tokio::spawn(async move {
            tokio::time::sleep(COPY_CONFIRMATION).await;
            if document.is_connected(button) {
                document.set_text(button, COPY_LABEL);
            }
        });
        Ok(())
    }

    fn bind_close(&self, button: NodeId) {
        let panel = self.panel;
        let stylesheet = self.stylesheet;
        self.document.add_event_listener(
            button,
            "click",
            Arc::new(move |doc: &Document, _: NodeId| {
                doc.remove(panel);
                doc.remove(stylesheet);
            }),
        );
    }

    // Handlers capture node ids only and take the document they run
    // against as an argument, so the document never owns a handle to itself.
    fn bind_copy(&self, button: NodeId) {
        let panel = self.panel;
        let stylesheet = self.stylesheet;
        let clipboard = Arc::clone(&self.clipboard);
        self.document.add_event_listener(
            button,
            "click",
            Arc::new(move |doc: &Document, _: NodeId| {
                let overlay = OverlayPanel {
                    document: doc.clone(),
                    panel,
                    stylesheet,
                    clipboard: Arc::clone(&clipboard),
                };
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            // failure is already logged inside copy()
                            let _ = overlay.copy().await;
                        });
                    }
                    Err(_) => warn!("Copy clicked outside an async runtime; ignoring"),
                }
            }),
        );
        self.document.add_event_listener(
            button,
            "mouseover",
            Arc::new(|doc: &Document, node: NodeId| {
                doc.set_style_property(node, "background-color", COPY_HOVER_COLOR);
            }),
        );
        self.document.add_event_listener(
            button,
            "mouseout",
            Arc::new(|doc: &Document, node: NodeId| {
                doc.set_style_property(node, "background-color", COPY_COLOR);
            }),
        );
    }
}
