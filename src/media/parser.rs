//! Media parsing utilities.

use url::Url;

use crate::api::types::{Deviation, MediaFile, VideoFile};
use crate::error::{Error, Result};
use crate::media::item::{AssetCandidate, CollectionItem};

/// Extensions the downloader is willing to write.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "png", "gif", "webp", "bmp", "mp4", "webm", "mov", "avi", "mkv", "flv", "m4v", "wmv",
];

/// Decode one entry of a collection page.
pub fn parse_collection_item(value: &serde_json::Value) -> Result<CollectionItem> {
    let deviation: Deviation = serde_json::from_value(value.clone())?;
    parse_deviation(&deviation)
}

/// Build a collection item from a deviation, listing every asset candidate.
pub fn parse_deviation(deviation: &Deviation) -> Result<CollectionItem> {
    if deviation.deviationid.trim().is_empty() {
        return Err(Error::fetch(None, "Deviation without an ID"));
    }

    let mut candidates = Vec::new();

    // Deleted deviations keep their metadata but no longer serve files.
    if !deviation.is_deleted {
        if let Some(content) = &deviation.content {
            candidates.push(image_candidate(content, true));
        }
        candidates.extend(deviation.videos.iter().map(video_candidate));
        if let Some(preview) = &deviation.preview {
            candidates.push(image_candidate(preview, false));
        }
        candidates.extend(deviation.thumbs.iter().map(|t| image_candidate(t, false)));
    }

    let title = deviation
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("untitled")
        .to_string();

    let artist_handle = deviation
        .author
        .as_ref()
        .map(|a| a.username.trim())
        .filter(|u| !u.is_empty())
        .unwrap_or("unknown")
        .to_string();

    Ok(CollectionItem {
        deviation_id: deviation.deviationid.clone(),
        title,
        artist_handle,
        asset_candidates: candidates,
    })
}

fn image_candidate(file: &MediaFile, is_download_variant: bool) -> AssetCandidate {
    AssetCandidate {
        url: file.src.clone(),
        width: file.width.unwrap_or(0),
        height: file.height.unwrap_or(0),
        mime_type: guess_mime(&file.src),
        is_download_variant,
        filesize: file.filesize,
    }
}

fn video_candidate(video: &VideoFile) -> AssetCandidate {
    AssetCandidate {
        url: video.src.clone(),
        width: 0,
        height: video
            .quality
            .as_deref()
            .and_then(parse_quality_height)
            .unwrap_or(0),
        mime_type: guess_mime(&video.src),
        is_download_variant: true,
        filesize: video.filesize,
    }
}

/// Height from a quality label such as `"1080p"`.
pub fn parse_quality_height(quality: &str) -> Option<u32> {
    let quality = quality.trim();
    quality
        .strip_suffix('p')
        .or_else(|| quality.strip_suffix('P'))
        .unwrap_or(quality)
        .parse()
        .ok()
}

/// Guess the MIME type from the URL path's extension.
pub fn guess_mime(url: &str) -> String {
    let path = url_path(url);
    mime_guess::from_path(&path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// File extension for a candidate: from its MIME type, then from the URL.
pub fn candidate_extension(candidate: &AssetCandidate) -> Option<String> {
    mime_to_extension(&candidate.mime_type)
        .map(str::to_string)
        .or_else(|| extract_extension_from_url(&candidate.url))
}

/// Whether the downloader accepts files with this extension.
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext)
}

fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    }
}

/// Extract extension from URL path.
fn extract_extension_from_url(url: &str) -> Option<String> {
    let path = url_path(url);

    // Get the last segment
    let filename = path.rsplit('/').next()?;

    let (_, ext) = filename.rsplit_once('.')?;

    // Validate it looks like an extension (1-10 chars, alphanumeric)
    if !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        let ext = ext.to_lowercase();
        Some(if ext == "jpeg" { "jpg".to_string() } else { ext })
    } else {
        None
    }
}

/// Convert MIME type to file extension.
fn mime_to_extension(mime_type: &str) -> Option<&'static str> {
    let ext = match mime_type {
        // Images
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",

        // Videos
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/x-matroska" => "mkv",
        "video/x-flv" => "flv",
        "video/x-m4v" => "m4v",
        "video/x-ms-wmv" => "wmv",

        _ => return None,
    };
    Some(ext)
}
