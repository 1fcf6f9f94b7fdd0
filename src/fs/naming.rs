//! Filename generation and manipulation.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Suffix of in-progress downloads.
pub const TEMP_SUFFIX: &str = ".part";

/// Longest filename stem (without extension) that is generated, in bytes.
///
/// Leaves room for the extension and [`TEMP_SUFFIX`] under the 255-byte
/// name limit of common filesystems.
pub const MAX_STEM_LEN: usize = 200;

/// Validate and sanitize a filename by removing or replacing invalid characters.
///
/// Returns an error if the filename contains path traversal patterns.
pub fn sanitize_filename(name: &str) -> Result<String> {
    // Reject path traversal attempts
    if name.contains("..") {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    // Also reject if it contains path separators (should be sanitized, not allowed)
    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidFilename(format!(
            "Path separators not allowed in filename: '{}'",
            name
        )));
    }

    // Reject null bytes
    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed in filename: '{}'",
            name
        )));
    }

    // Sanitize remaining problematic characters
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // Reject empty or whitespace-only names
    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Filename cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Sanitize one component of a generated filename.
///
/// Unlike [`sanitize_filename`] this never rejects: separators, reserved
/// characters and `..` sequences are replaced so untrusted titles and
/// usernames can be embedded safely.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let mut sanitized = replaced.replace("..", "_");
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "_");
    }
    sanitized
}

/// Build `{artist}_{title}_{deviation_id}.{ext}`.
///
/// The stem is cut to [`MAX_STEM_LEN`] bytes by shortening the
/// artist/title part, so the deviation ID always survives.
pub fn asset_filename(artist: &str, title: &str, deviation_id: &str, ext: &str) -> Result<String> {
    let id = sanitize_component(deviation_id);
    let prefix = format!("{}_{}", sanitize_component(artist), sanitize_component(title));

    let budget = MAX_STEM_LEN.saturating_sub(id.len() + 1);
    let prefix = truncate_bytes(&prefix, budget);

    let stem = format!("{}_{}", prefix, id);
    // Truncation may have produced a new ".." at the cut.
    let stem = sanitize_component(&stem);

    sanitize_filename(&format!("{}.{}", stem, sanitize_component(ext)))
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Temporary path a download is streamed to before being renamed.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    final_path.with_file_name(name)
}

/// Whether a path is an in-progress download.
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.ends_with(TEMP_SUFFIX))
}
