//! Error types for the deviantart-favorites application.

use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // Authorization errors (fatal to the run)
    #[error("Authorization denied: {0}")]
    AuthDenied(String),

    #[error("Authorization protocol error: {0}")]
    AuthProtocolError(String),

    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    #[error("Credential store error: {0}")]
    Credential(String),

    // API request errors
    #[error("API request failed{}: {detail}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    FetchError { status: Option<u16>, detail: String },

    #[error("Rate limited{}", .0.map(|s| format!(", retry after {} seconds", s)).unwrap_or_default())]
    RateLimited(Option<u64>),

    #[error("Unexpected HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // File system errors
    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Whether this error belongs to the authorization layer.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Error::AuthDenied(_) | Error::AuthProtocolError(_) | Error::AuthExpired(_)
        )
    }

    pub(crate) fn fetch(status: Option<u16>, detail: impl Into<String>) -> Self {
        Error::FetchError {
            status,
            detail: detail.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const AUTH_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const SOME_ITEMS_FAILED: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
}
