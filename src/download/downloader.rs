//! Media file downloading.

use std::path::Path;

use futures::{Stream, StreamExt};
use indicatif::ProgressBar;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::api::{is_transient, retry_after, DeviantArtApi, RetryPolicy};
use crate::download::outcome::{DownloadOutcome, ItemFailure};
use crate::error::{Error, Result};
use crate::fs::temp_path;
use crate::media::AssetReference;
use crate::output::create_download_bar;

/// Minimum file size to show progress bar (20 MB).
const PROGRESS_THRESHOLD: u64 = 20 * 1024 * 1024;

/// Fetches resolved assets into a directory.
pub struct Downloader<'a> {
    api: &'a DeviantArtApi,
    retry: RetryPolicy,
    show_progress: bool,
}

impl<'a> Downloader<'a> {
    pub fn new(api: &'a DeviantArtApi, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Download an asset into `destination`.
    ///
    /// Never fails: every problem ends up in the returned outcome. An asset
    /// whose file already exists is reported as present without a request.
    pub async fn fetch(&self, asset: &AssetReference, destination: &Path) -> DownloadOutcome {
        let filename = match asset.generate_filename() {
            Ok(name) => name,
            Err(e) => {
                return DownloadOutcome::failed(
                    &asset.deviation_id,
                    ItemFailure::StorageError {
                        detail: e.to_string(),
                    },
                    0,
                )
            }
        };
        let output_path = destination.join(&filename);

        if output_path.exists() {
            tracing::debug!("Skipping existing file: {}", output_path.display());
            return DownloadOutcome::succeeded(&asset.deviation_id, output_path, true, 0);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.try_fetch(asset.url(), &output_path).await {
                Ok(bytes) => {
                    tracing::info!("Downloaded: {} ({} bytes)", output_path.display(), bytes);
                    return DownloadOutcome::succeeded(
                        &asset.deviation_id,
                        output_path,
                        false,
                        attempt,
                    );
                }
                Err(e) if is_transient(&e) && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt, retry_after(&e));
                    tracing::warn!(
                        "Download of {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        asset.deviation_id,
                        attempt,
                        self.retry.max_attempts(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!("Download of {} failed: {}", asset.deviation_id, e);
                    return DownloadOutcome::failed(
                        &asset.deviation_id,
                        classify_failure(e),
                        attempt,
                    );
                }
            }
        }
    }

    /// One download attempt.
    async fn try_fetch(&self, url: &str, output_path: &Path) -> Result<u64> {
        let response = self.api.download_file(url).await?;

        let content_length = response.content_length();
        let show_progress =
            self.show_progress && content_length.map(|l| l > PROGRESS_THRESHOLD).unwrap_or(false);

        let progress = if show_progress {
            let name = output_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Some(create_download_bar(content_length.unwrap_or(0), &name))
        } else {
            None
        };

        let result = write_atomically(response.bytes_stream(), output_path, progress.as_ref()).await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        result
    }
}

/// Stream `chunks` to `output_path` through a temporary sibling file.
///
/// The destination only ever appears complete: data goes to
/// `{output_path}.part`, which is synced and then renamed. On error the
/// temporary file is removed; if the future is dropped midway it stays
/// behind for the next run's cleanup.
pub async fn write_atomically<S, B, E>(
    chunks: S,
    output_path: &Path,
    progress: Option<&ProgressBar>,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    let temp = temp_path(output_path);

    let written = match stream_to_file(chunks, &temp, progress).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&temp, output_path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }

    Ok(written)
}

async fn stream_to_file<S, B, E>(
    chunks: S,
    path: &Path,
    progress: Option<&ProgressBar>,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Error>,
{
    tokio::pin!(chunks);

    let mut file = File::create(path).await?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(Into::into)?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        downloaded += bytes.len() as u64;

        if let Some(pb) = progress {
            pb.set_position(downloaded);
        }
    }

    file.flush().await?;
    file.sync_all().await?;

    Ok(downloaded)
}

fn classify_failure(err: Error) -> ItemFailure {
    match err {
        Error::Io(e) => ItemFailure::StorageError {
            detail: e.to_string(),
        },
        Error::HttpStatus { status, .. } => ItemFailure::DownloadError {
            status: Some(status),
            detail: err.to_string(),
        },
        Error::Http(ref e) => ItemFailure::DownloadError {
            status: e.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        },
        other => ItemFailure::DownloadError {
            status: None,
            detail: other.to_string(),
        },
    }
}
