//! Configuration structures and loading logic.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::api::{RateLimiter, RetryPolicy};
use crate::error::{Error, Result};

/// DeviantArt OAuth authorization server base URL.
pub const DEFAULT_AUTH_BASE: &str = "https://www.deviantart.com/oauth2";

/// DeviantArt API base URL.
pub const DEFAULT_API_BASE: &str = "https://www.deviantart.com/api/v1/oauth2";

/// Maximum page size accepted by `/collections/all`.
pub const MAX_PAGE_LIMIT: u32 = 24;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oauth: OAuthConfig,

    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

/// Registered application credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Client ID from the DeviantArt developer page.
    #[serde(default)]
    pub client_id: String,

    /// Client secret from the DeviantArt developer page.
    #[serde(default)]
    pub client_secret: String,

    /// Redirect URI registered for the application.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Requested OAuth scopes.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
        }
    }
}

/// Download options configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Whose favourites to download. Defaults to the authenticated user.
    #[serde(default)]
    pub username: Option<String>,

    /// Directory downloaded files are written to.
    #[serde(default)]
    pub download_directory: Option<PathBuf>,

    /// Where the OAuth credential is persisted.
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    /// Items requested per collection page.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Whether mature deviations are included.
    #[serde(default = "default_true")]
    pub mature_content: bool,

    /// Minimum delay between outbound requests.
    #[serde(default = "default_request_interval")]
    pub request_interval_ms: u64,

    /// Random extra delay added on top of the interval.
    #[serde(default = "default_request_jitter")]
    pub request_jitter_ms: u64,

    /// Attempts per page fetch or download, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubled on every further attempt.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    /// Refresh the access token when less than this remains.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,

    /// Longest silence tolerated while waiting for response data.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// How long to wait for the user to authorize the application.
    #[serde(default = "default_authorization_timeout")]
    pub authorization_timeout_secs: u64,

    /// Capture the redirect with a local HTTP listener instead of asking
    /// the user to paste the code.
    #[serde(default = "default_true")]
    pub callback_server: bool,

    /// Whether to show progress bars for large downloads.
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            username: None,
            download_directory: None,
            credentials_file: None,
            page_limit: default_page_limit(),
            mature_content: true,
            request_interval_ms: default_request_interval(),
            request_jitter_ms: default_request_jitter(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
            refresh_margin_secs: default_refresh_margin(),
            read_timeout_secs: default_read_timeout(),
            authorization_timeout_secs: default_authorization_timeout(),
            callback_server: true,
            show_progress: true,
        }
    }
}

/// Remote endpoint overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_auth_base")]
    pub auth_base: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            auth_base: default_auth_base(),
            api_base: default_api_base(),
        }
    }
}

fn default_redirect_uri() -> String {
    "http://localhost:8080/callback".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["user".to_string(), "browse".to_string()]
}

fn default_auth_base() -> String {
    DEFAULT_AUTH_BASE.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_limit() -> u32 {
    MAX_PAGE_LIMIT
}

fn default_request_interval() -> u64 {
    500
}

fn default_request_jitter() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    4
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_backoff_max() -> u64 {
    32_000
}

fn default_refresh_margin() -> u64 {
    60
}

fn default_read_timeout() -> u64 {
    30
}

fn default_authorization_timeout() -> u64 {
    300
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the effective download directory.
    pub fn download_directory(&self) -> PathBuf {
        self.options
            .download_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("DeviantArt_API_Downloads"))
    }

    /// Get the effective credential file path.
    ///
    /// Falls back to the platform data directory, then to the working directory.
    pub fn credentials_path(&self) -> PathBuf {
        if let Some(path) = &self.options.credentials_file {
            return path.clone();
        }

        ProjectDirs::from("com", "deviantart-favorites", "deviantart-favorites")
            .map(|dirs| dirs.data_dir().join("credentials.json"))
            .unwrap_or_else(|| PathBuf::from("deviantart_tokens.json"))
    }

    /// Retry policy shared by page fetches and downloads.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.options.max_attempts,
            Duration::from_millis(self.options.backoff_base_ms),
            Duration::from_millis(self.options.backoff_max_ms),
        )
    }

    /// Rate limiter pacing every outbound request.
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            Duration::from_millis(self.options.request_interval_ms),
            Duration::from_millis(self.options.request_jitter_ms),
        )
    }

    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.options.refresh_margin_secs as i64)
    }

    pub fn authorization_timeout(&self) -> Duration {
        Duration::from_secs(self.options.authorization_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.options.read_timeout_secs)
    }
}
