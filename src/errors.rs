use thiserror::Error;

#[derive(Debug, Error)]
pub enum LensError {
    #[error("No API key has been configured")]
    MissingCredential,

    #[error("API key must not be empty")]
    EmptyCredentialInput,

    #[error("{0}")]
    RemoteService(String),

    #[error("Failed to write to the clipboard: {0}")]
    ClipboardWrite(String),

    #[error("Failed to access extension storage: {0}")]
    Storage(String),

    #[error("Failed to send HTTP request: {0}")]
    Http(String),

    #[error("Host browser request failed: {0}")]
    Host(String),

    #[error("Invalid document: {0}")]
    Document(String),
}

impl From<reqwest::Error> for LensError {
    fn from(error: reqwest::Error) -> Self {
        LensError::Http(error.to_string())
    }
}

impl From<serde_json::Error> for LensError {
    fn from(error: serde_json::Error) -> Self {
        LensError::Storage(error.to_string())
    }
}

impl From<std::io::Error> for LensError {
    fn from(error: std::io::Error) -> Self {
        LensError::Storage(error.to_string())
    }
}

impl From<anyhow::Error> for LensError {
    fn from(error: anyhow::Error) -> Self {
        LensError::Host(error.to_string())
    }
}
