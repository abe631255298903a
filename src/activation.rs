//! Activation Controller: the install hook, the popup and the bridge that runs
//! the page pipeline inside the active tab.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::clients::Summarizer;
use crate::core::models::ApiCredential;
use crate::dom::Document;
use crate::errors::LensError;
use crate::overlay::OverlayRenderer;
use crate::pipeline::analyze_page;
use crate::storage::CredentialStore;

pub const MISSING_KEY_ALERT: &str = "Please set your API key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u32);

/// Browser-side capabilities the controller depends on.
#[async_trait]
pub trait ExtensionHost: Send + Sync {
    async fn is_enabled(&self) -> Result<bool, LensError>;
    async fn set_enabled(&self, enabled: bool) -> Result<(), LensError>;
    async fn active_tab(&self) -> Result<TabId, LensError>;
    /// Blocking alert shown to the user.
    async fn alert(&self, message: &str);
}

/// Runs the page pipeline in the context of a tab.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, tab: TabId, credential: ApiCredential) -> Result<(), LensError>;
}

/// Install hook: make sure the extension has not been left disabled.
/// Returns true when it had to be re-enabled.
///
/// # Errors
///
/// Propagates host failures.
pub async fn on_installed(host: &dyn ExtensionHost) -> Result<bool, LensError> {
    if host.is_enabled().await? {
        return Ok(false);
    }
    warn!("Extension found disabled after install; enabling it");
    host.set_enabled(true).await?;
    Ok(true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupView {
    KeyEntry,
    Main,
}

pub struct Popup {
    store: Arc<dyn CredentialStore>,
    host: Arc<dyn ExtensionHost>,
    executor: Arc<dyn RemoteExecutor>,
    view: PopupView,
    key_error_visible: bool,
}

impl Popup {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        host: Arc<dyn ExtensionHost>,
        executor: Arc<dyn RemoteExecutor>,
    ) -> Self {
        Self {
            store,
            host,
            executor,
            view: PopupView::KeyEntry,
            key_error_visible: false,
        }
    }

    #[must_use]
    pub fn view(&self) -> PopupView {
        self.view
    }

    #[must_use]
    pub fn key_error_visible(&self) -> bool {
        self.key_error_visible
    }

    /// Pick the initial view from whether a key is stored.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn open(&mut self) -> Result<PopupView, LensError> {
        self.view = match self.store.get().await? {
            Some(_) => PopupView::Main,
            None => PopupView::KeyEntry,
        };
        Ok(self.view)
    }

    /// Save a key typed by the user, then explain the active page right away.
    ///
    /// # Errors
    ///
    /// [`LensError::EmptyCredentialInput`] for an empty input (storage is not
    /// touched and the inline error becomes visible); otherwise storage, host
    /// or executor failures.
    pub async fn submit_key(&mut self, input: &str) -> Result<(), LensError> {
        if input.is_empty() {
            self.key_error_visible = true;
            return Err(LensError::EmptyCredentialInput);
        }
        self.key_error_visible = false;

        let credential = ApiCredential::new(input);
        self.store.set(credential.clone()).await?;
        self.view = PopupView::Main;
        info!("API key saved; explaining the active page");

        self.trigger(credential).await
    }

    /// The "explain" button.
    ///
    /// # Errors
    ///
    /// [`LensError::MissingCredential`] after alerting the user when no key is
    /// stored; otherwise storage, host or executor failures.
    pub async fn explain(&mut self) -> Result<(), LensError> {
        let Some(credential) = self.store.get().await? else {
            self.host.alert(MISSING_KEY_ALERT).await;
            return Err(LensError::MissingCredential);
        };
        self.trigger(credential).await
    }

    async fn trigger(&self, credential: ApiCredential) -> Result<(), LensError> {
        let tab = self.host.active_tab().await?;
        self.executor.run(tab, credential).await
    }
}

/// In-process [`RemoteExecutor`]: owns the documents of the tabs it knows and
/// runs the pipeline against them directly.
pub struct PageRunner {
    pages: Mutex<HashMap<TabId, Document>>,
    summarizer: Arc<dyn Summarizer>,
    renderer: OverlayRenderer,
}

impl PageRunner {
    pub fn new(summarizer: Arc<dyn Summarizer>, renderer: OverlayRenderer) -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            summarizer,
            renderer,
        }
    }

    pub fn insert(&self, tab: TabId, document: Document) {
        self.pages.lock().insert(tab, document);
    }

    #[must_use]
    pub fn document(&self, tab: TabId) -> Option<Document> {
        self.pages.lock().get(&tab).cloned()
    }

    #[must_use]
    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }
}

#[async_trait]
impl RemoteExecutor for PageRunner {
    async fn run(&self, tab: TabId, credential: ApiCredential) -> Result<(), LensError> {
        let document = self
            .document(tab)
            .ok_or_else(|| LensError::Host(format!("no page loaded in tab {}", tab.0)))?;
        analyze_page(
            &document,
            self.summarizer.as_ref(),
            &self.renderer,
            &credential,
        )
        .await;
        Ok(())
    }
}

/// [`ExtensionHost`] with a fixed active tab, used by the headless runner.
/// Alerts are logged and kept for inspection.
#[derive(Debug)]
pub struct LocalHost {
    enabled: Mutex<bool>,
    active: TabId,
    alerts: Mutex<Vec<String>>,
}

impl LocalHost {
    #[must_use]
    pub fn new(active: TabId, enabled: bool) -> Self {
        Self {
            enabled: Mutex::new(enabled),
            active,
            alerts: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().clone()
    }
}

#[async_trait]
impl ExtensionHost for LocalHost {
    async fn is_enabled(&self) -> Result<bool, LensError> {
        Ok(*self.enabled.lock())
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), LensError> {
        *self.enabled.lock() = enabled;
        Ok(())
    }

    async fn active_tab(&self) -> Result<TabId, LensError> {
        Ok(self.active)
    }

    async fn alert(&self, message: &str) {
        warn!("Alert: {}", message);
        self.alerts.lock().push(message.to_string());
    }
}
