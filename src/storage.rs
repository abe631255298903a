//! Extension-scoped credential storage.
//!
//! The store holds exactly one value, the API key, under [`CREDENTIAL_KEY`].
//! Nothing is validated locally; the remote service is the only judge of
//! whether a key works.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::models::ApiCredential;
use crate::errors::LensError;

pub const CREDENTIAL_KEY: &str = "geminiApiKey";

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    async fn get(&self) -> Result<Option<ApiCredential>, LensError>;

    /// Overwrite the stored credential unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    async fn set(&self, value: ApiCredential) -> Result<(), LensError>;
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    value: Mutex<Option<ApiCredential>>,
    writes: Mutex<usize>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_credential(value: ApiCredential) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            writes: Mutex::new(0),
        }
    }

    /// Number of `set` calls seen so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Option<ApiCredential>, LensError> {
        Ok(self.value.lock().clone())
    }

    async fn set(&self, value: ApiCredential) -> Result<(), LensError> {
        *self.value.lock() = Some(value);
        *self.writes.lock() += 1;
        Ok(())
    }
}

/// JSON key-value file, the on-disk counterpart of `chrome.storage.local`.
/// Unknown keys already in the file are preserved on write.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/pagelens/storage.json`, or the given override.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is given and the platform has no data
    /// directory.
    pub fn at_default_location(override_path: Option<&Path>) -> Result<Self, LensError> {
        if let Some(path) = override_path {
            return Ok(Self::new(path));
        }
        let base = dirs::data_dir()
            .ok_or_else(|| LensError::Storage("no user data directory available".to_string()))?;
        Ok(Self::new(base.join("pagelens").join("storage.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<Map<String, Value>, LensError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Storage file {} does not exist yet", self.path.display());
                return Ok(Map::new());
            }
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            other => Err(LensError::Storage(format!(
                "expected a JSON object in {}, found {}",
                self.path.display(),
                kind_of(&other)
            ))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Option<ApiCredential>, LensError> {
        let map = self.read_map().await?;
        Ok(map
            .get(CREDENTIAL_KEY)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(ApiCredential::new))
    }

    async fn set(&self, value: ApiCredential) -> Result<(), LensError> {
        let mut map = self.read_map().await?;
        map.insert(
            CREDENTIAL_KEY.to_string(),
            Value::String(value.expose().to_string()),
        );
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(&Value::Object(map))?;
        write_private(&self.path, body.as_bytes()).await?;
        info!("Stored API key in {}", self.path.display());
        Ok(())
    }
}

/// Writes `body` to `path`, readable by the owner only on unix.
async fn write_private(path: &Path, body: &[u8]) -> Result<(), LensError> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path).await?;
    // mode only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(body).await?;
    file.flush().await?;
    Ok(())
}
