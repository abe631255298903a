// Headless host: loads a page, keeps it highlighted, and runs the popup flow
// against it the way the browser would.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use url::Url;

use pagelens::activation::{LocalHost, PageRunner, Popup, PopupView, TabId, on_installed};
use pagelens::clients::SummaryClient;
use pagelens::core::config::AppConfig;
use pagelens::core::models::ApiCredential;
use pagelens::dom::Document;
use pagelens::observer::PageObserver;
use pagelens::overlay::{MemoryClipboard, OverlayRenderer};
use pagelens::storage::{CredentialStore, FileCredentialStore};

const ACTIVE_TAB: TabId = TabId(1);

#[derive(Debug, Parser)]
#[command(name = "pagelens", about = "Explain a web page with a generative-language model")]
struct Cli {
    /// Storage file holding the API key
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Language the explanation is written in
    #[arg(long, global = true)]
    language: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store the API key
    SetKey { key: String },
    /// Report whether an API key is stored
    KeyStatus,
    /// Explain a page given as an http(s) URL or a local HTML file
    Explain {
        target: String,
        /// Page URL to assume when `target` is a local file
        #[arg(long)]
        url: Option<Url>,
    },
}

async fn load_document(target: &str, assumed_url: Option<Url>) -> Result<Document> {
    if let Ok(url) = Url::parse(target)
        && matches!(url.scheme(), "http" | "https")
    {
        info!("Fetching {}", url);
        let html = reqwest::get(url.clone())
            .await
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()?
            .text()
            .await?;
        return Ok(Document::from_html(&html, Some(url)));
    }

    let html = tokio::fs::read_to_string(target)
        .await
        .with_context(|| format!("failed to read {target}"))?;
    Ok(Document::from_html(&html, assumed_url))
}

#[tokio::main]
async fn main() -> Result<()> {
    pagelens::setup_logging();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(language) = cli.language {
        config.language = language;
    }
    if let Some(storage) = cli.storage {
        config.storage_path = Some(storage);
    }

    let store = Arc::new(FileCredentialStore::at_default_location(
        config.storage_path.as_deref(),
    )?);

    match cli.command {
        Command::SetKey { key } => {
            if key.is_empty() {
                bail!(pagelens::LensError::EmptyCredentialInput);
            }
            store.set(ApiCredential::new(key)).await?;
            println!("API key saved to {}", store.path().display());
        }
        Command::KeyStatus => match store.get().await? {
            Some(_) => println!("An API key is stored in {}", store.path().display()),
            None => println!("No API key stored"),
        },
        Command::Explain { target, url } => {
            let host = Arc::new(LocalHost::new(ACTIVE_TAB, true));
            on_installed(host.as_ref()).await?;

            let document = load_document(&target, url).await?;
            let _observer = PageObserver::attach_for_page(&document)?;

            let renderer = OverlayRenderer::new(Arc::new(MemoryClipboard::new()));
            let runner = Arc::new(PageRunner::new(
                Arc::new(SummaryClient::new(&config)),
                renderer.clone(),
            ));
            runner.insert(ACTIVE_TAB, document.clone());

            let mut popup = Popup::new(store.clone(), host, runner);
            if popup.open().await? == PopupView::KeyEntry {
                bail!("no API key stored; run `pagelens set-key <KEY>` first");
            }
            popup.explain().await?;

            let panel = renderer
                .current(&document)
                .context("explanation panel is missing")?;
            println!("{}", panel.body_text().unwrap_or_default());
        }
    }

    Ok(())
}
