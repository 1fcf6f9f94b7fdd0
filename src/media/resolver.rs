//! Best-asset selection.
//!
//! Among the eligible candidates of an item (image or video with a supported
//! extension), the download variant beats any preview; within the same tier
//! the largest pixel area wins, then the greater height (video renditions
//! only state a height), then the larger reported file size. Remaining ties
//! go to the candidate listed last, since the API lists renditions in
//! ascending quality.

use crate::media::item::{AssetCandidate, AssetReference, CollectionItem, MediaType};
use crate::media::parser::{candidate_extension, is_supported_extension};

/// Select the best downloadable asset of an item.
pub fn resolve(item: &CollectionItem) -> Option<AssetReference> {
    let (candidate, extension) = item
        .asset_candidates
        .iter()
        .filter_map(|c| eligible(c).map(|ext| (c, ext)))
        .max_by_key(|(c, _)| rank(c))?;

    tracing::debug!(
        "Resolved {} to {}x{} {} ({})",
        item.deviation_id,
        candidate.width,
        candidate.height,
        candidate.mime_type,
        if candidate.is_download_variant {
            "download"
        } else {
            "preview"
        }
    );

    Some(AssetReference {
        deviation_id: item.deviation_id.clone(),
        title: item.title.clone(),
        artist_handle: item.artist_handle.clone(),
        candidate: candidate.clone(),
        extension,
    })
}

fn eligible(candidate: &AssetCandidate) -> Option<String> {
    if candidate.url.is_empty() || candidate.media_type() == MediaType::Unknown {
        return None;
    }
    candidate_extension(candidate).filter(|ext| is_supported_extension(ext))
}

fn rank(candidate: &AssetCandidate) -> (bool, u64, u32, u64) {
    (
        candidate.is_download_variant,
        candidate.area(),
        candidate.height,
        candidate.filesize.unwrap_or(0),
    )
}
