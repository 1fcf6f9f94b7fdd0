//! Collection item representation.

use crate::error::Result;
use crate::fs::asset_filename;

/// Type of media content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
    Unknown,
}

impl MediaType {
    /// Classify a MIME type.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            MediaType::Image
        } else if mime_type.starts_with("video/") {
            MediaType::Video
        } else {
            MediaType::Unknown
        }
    }
}

/// One representation of a deviation's media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCandidate {
    /// Download URL.
    pub url: String,

    /// Width in pixels, 0 when unknown.
    pub width: u32,

    /// Height in pixels, 0 when unknown.
    pub height: u32,

    /// MIME type guessed from the URL.
    pub mime_type: String,

    /// Full-resolution content rather than a preview or thumbnail.
    pub is_download_variant: bool,

    /// Size in bytes, if the API reported it.
    pub filesize: Option<u64>,
}

impl AssetCandidate {
    /// Resolution (width * height).
    pub fn area(&self) -> u64 {
        (self.width as u64) * (self.height as u64)
    }

    pub fn media_type(&self) -> MediaType {
        MediaType::from_mime(&self.mime_type)
    }
}

/// A favourited deviation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionItem {
    /// Unique deviation ID.
    pub deviation_id: String,

    pub title: String,

    /// Author's username.
    pub artist_handle: String,

    /// Candidates in the order the API lists them.
    pub asset_candidates: Vec<AssetCandidate>,
}

/// The asset selected for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    pub deviation_id: String,
    pub title: String,
    pub artist_handle: String,
    pub candidate: AssetCandidate,

    /// File extension (without dot).
    pub extension: String,
}

impl AssetReference {
    pub fn url(&self) -> &str {
        &self.candidate.url
    }

    pub fn media_type(&self) -> MediaType {
        self.candidate.media_type()
    }

    /// Generate the filename for this asset.
    pub fn generate_filename(&self) -> Result<String> {
        asset_filename(
            &self.artist_handle,
            &self.title,
            &self.deviation_id,
            &self.extension,
        )
    }
}
