//! Whole-collection download.

use std::path::Path;

use crate::api::DeviantArtApi;
use crate::auth::{CodeReceiver, TokenManager, TokenStore};
use crate::config::Config;
use crate::download::downloader::Downloader;
use crate::download::ledger::{FailureLedger, RunSummary};
use crate::download::outcome::{DownloadOutcome, OutcomeStatus, SkipReason};
use crate::download::paginator::CollectionPaginator;
use crate::error::Result;
use crate::fs::{collect_garbage, ensure_dir};
use crate::media::resolve;
use crate::output::print_info;

/// Download every favourite of the configured user into `output_dir`.
///
/// Only authorization and setup problems are errors; per-item and per-page
/// problems are reported in the returned summary.
pub async fn run<S: TokenStore>(
    config: &Config,
    output_dir: &Path,
    store: S,
    receiver: &dyn CodeReceiver,
) -> Result<RunSummary> {
    let api = DeviantArtApi::with_read_timeout(
        &config.endpoints,
        config.rate_limiter(),
        config.read_timeout(),
    )?;
    run_with(&api, config, output_dir, store, receiver).await
}

/// [`run`] against an existing API client.
pub async fn run_with<S: TokenStore>(
    api: &DeviantArtApi,
    config: &Config,
    output_dir: &Path,
    store: S,
    receiver: &dyn CodeReceiver,
) -> Result<RunSummary> {
    ensure_dir(output_dir)?;
    collect_garbage(output_dir)?;

    let mut tokens = TokenManager::new(store, config.oauth.clone())
        .with_refresh_margin(config.refresh_margin())
        .with_authorization_timeout(config.authorization_timeout());
    tokens.load_or_acquire(api, receiver).await?;

    let retry = config.retry_policy();

    let username = match &config.options.username {
        Some(username) => username.clone(),
        None => {
            let user = tokens
                .authorized(
                    api,
                    &retry,
                    "Looking up the authenticated user",
                    move |token| async move { api.whoami(&token).await },
                )
                .await?;
            tracing::info!("Authenticated as {} ({})", user.username, user.userid);
            user.username
        }
    };

    print_info(&format!(
        "Downloading favourites of {} to {}",
        username,
        output_dir.display()
    ));

    let mut paginator = CollectionPaginator::new(api, &mut tokens, username, retry.clone())
        .with_limit(config.options.page_limit)
        .with_mature_content(config.options.mature_content);
    let downloader = Downloader::new(api, retry).with_progress(config.options.show_progress);
    let mut ledger = FailureLedger::new();

    while let Some(items) = paginator.next_page().await? {
        for failure in paginator.take_page_failures() {
            ledger.record_page_failure(failure);
        }

        for item in items {
            if ledger.is_recorded(&item.deviation_id) {
                tracing::debug!("Duplicate deviation {} dropped", item.deviation_id);
                continue;
            }

            let outcome = match resolve(&item) {
                Some(asset) => downloader.fetch(&asset, output_dir).await,
                None => {
                    DownloadOutcome::skipped(&item.deviation_id, SkipReason::NoAccessibleAsset)
                }
            };

            log_outcome(&item.title, &outcome);
            ledger.record(outcome);
        }
    }

    for failure in paginator.take_page_failures() {
        ledger.record_page_failure(failure);
    }

    Ok(ledger.summary())
}

fn log_outcome(title: &str, outcome: &DownloadOutcome) {
    match &outcome.status {
        OutcomeStatus::Succeeded {
            already_present: true,
            ..
        } => tracing::debug!("Already present: {}", title),
        OutcomeStatus::Succeeded { .. } => {}
        OutcomeStatus::Skipped { reason } => tracing::info!("Skipped '{}': {}", title, reason),
        OutcomeStatus::Failed { reason } => tracing::warn!("Failed '{}': {}", title, reason),
    }
}
