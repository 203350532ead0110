use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    API_URL_ENV, DEFAULT_API_URL, SETTINGS_DIR_NAME, SETTINGS_FILE_NAME,
};

/// When the person cache is re-fetched after it has been invalidated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Re-fetch as part of the mutating call.
    #[default]
    Immediate,
    /// Re-fetch lazily on the next read, so bursts of mutations cost one fetch.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_secs: Option<u64>,
    pub refresh: RefreshPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: None,
            refresh: RefreshPolicy::Immediate,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Defaults, then the settings file, then the `FACE_ENROLL_API_URL` override.
    pub fn load() -> Self {
        let from_file = Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default();
        from_file.with_api_url(std::env::var(API_URL_ENV).ok())
    }

    /// Reads a settings file, falling back to defaults when it is missing or malformed.
    pub fn load_from(path: &Path) -> Self {
        let settings = fs::read_to_string(path)
            .ok()
            .and_then(|json| match serde_json::from_str::<Settings>(&json) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    log::warn!("Ignoring malformed settings at {}: {e}", path.display());
                    None
                }
            })
            .unwrap_or_default();
        let api_url = normalize_url(&settings.api_url).unwrap_or_else(|| DEFAULT_API_URL.into());
        Self { api_url, ..settings }
    }

    /// Applies a base URL override. Blank values are ignored.
    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.as_deref().and_then(normalize_url) {
            self.api_url = url;
        }
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn normalize_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
