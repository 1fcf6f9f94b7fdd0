//! API response type definitions.

use serde::Deserialize;

/// Token endpoint success response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Error body returned by the token endpoint and by rejected API calls.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    /// Human-readable description, falling back to the error code.
    pub fn describe(&self) -> String {
        match &self.error_description {
            Some(desc) if !desc.is_empty() => format!("{} ({})", desc, self.error),
            _ => self.error.clone(),
        }
    }
}

/// `/user/whoami` response.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub userid: String,
    pub username: String,
}

/// One page of `/collections/all`.
///
/// Results are kept as raw JSON so that one malformed deviation does not
/// invalidate the whole page.
#[derive(Debug, Deserialize)]
pub struct CollectionPage {
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_offset: Option<u32>,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// A deviation from a collection page.
#[derive(Debug, Clone, Deserialize)]
pub struct Deviation {
    pub deviationid: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub is_deleted: bool,
    /// Full-resolution image.
    #[serde(default)]
    pub content: Option<MediaFile>,
    #[serde(default)]
    pub preview: Option<MediaFile>,
    #[serde(default)]
    pub thumbs: Vec<MediaFile>,
    /// Video renditions, lowest quality first.
    #[serde(default)]
    pub videos: Vec<VideoFile>,
}

/// Deviation author.
#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub username: String,
}

/// Image file location.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaFile {
    pub src: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

/// Video rendition.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoFile {
    pub src: String,
    /// Quality label such as `"1080p"`.
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
}
