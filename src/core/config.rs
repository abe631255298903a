use std::env;
use std::path::PathBuf;

pub const DEFAULT_ENDPOINT_BASE: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-pro";
pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub endpoint_base: String,
    pub model: String,
    pub language: String,
    pub storage_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint_base: DEFAULT_ENDPOINT_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            storage_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unset or blank
    /// variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            endpoint_base: get("PAGELENS_ENDPOINT")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint_base),
            model: get("PAGELENS_MODEL").unwrap_or(defaults.model),
            language: get("PAGELENS_LANGUAGE").unwrap_or(defaults.language),
            storage_path: get("PAGELENS_STORAGE").map(PathBuf::from),
        }
    }

    /// Full `generateContent` URL, without the credential query parameter.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint_base, self.model)
    }
}
