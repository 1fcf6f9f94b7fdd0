//! Per-item download outcomes.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Why an item was not downloaded although nothing went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// None of the item's representations is a downloadable image or video.
    NoAccessibleAsset,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoAccessibleAsset => write!(f, "no accessible asset"),
        }
    }
}

/// Why an item download failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemFailure {
    /// The media host kept failing or refused the request.
    DownloadError { status: Option<u16>, detail: String },

    /// The file could not be written.
    StorageError { detail: String },
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemFailure::DownloadError {
                status: Some(status),
                detail,
            } => write!(f, "download failed (HTTP {}): {}", status, detail),
            ItemFailure::DownloadError { status: None, detail } => {
                write!(f, "download failed: {}", detail)
            }
            ItemFailure::StorageError { detail } => write!(f, "storage error: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded {
        local_path: PathBuf,
        /// The file was already on disk from an earlier run.
        already_present: bool,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        reason: ItemFailure,
    },
}

/// Result of processing one collection item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    pub deviation_id: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// Requests made for this item; 0 when none was needed.
    pub attempts: u32,
}

impl DownloadOutcome {
    pub fn succeeded(
        deviation_id: impl Into<String>,
        local_path: PathBuf,
        already_present: bool,
        attempts: u32,
    ) -> Self {
        Self {
            deviation_id: deviation_id.into(),
            status: OutcomeStatus::Succeeded {
                local_path,
                already_present,
            },
            attempts,
        }
    }

    pub fn skipped(deviation_id: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            deviation_id: deviation_id.into(),
            status: OutcomeStatus::Skipped { reason },
            attempts: 0,
        }
    }

    pub fn failed(deviation_id: impl Into<String>, reason: ItemFailure, attempts: u32) -> Self {
        Self {
            deviation_id: deviation_id.into(),
            status: OutcomeStatus::Failed { reason },
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }

    /// Where the file is, for successful outcomes.
    pub fn local_path(&self) -> Option<&Path> {
        match &self.status {
            OutcomeStatus::Succeeded { local_path, .. } => Some(local_path),
            _ => None,
        }
    }

    /// What went wrong, for failed outcomes.
    pub fn error_detail(&self) -> Option<String> {
        match &self.status {
            OutcomeStatus::Failed { reason } => Some(reason.to_string()),
            _ => None,
        }
    }

    /// Attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// A collection page, or an entry of one, that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub offset: u32,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let ok = DownloadOutcome::succeeded("A", PathBuf::from("/d/a.png"), false, 2);
        assert!(ok.is_success());
        assert_eq!(ok.local_path(), Some(Path::new("/d/a.png")));
        assert!(ok.error_detail().is_none());
        assert_eq!(ok.retries(), 1);

        let failed = DownloadOutcome::failed(
            "B",
            ItemFailure::DownloadError {
                status: Some(404),
                detail: "not found".into(),
            },
            1,
        );
        assert!(failed.is_failure());
        assert!(failed.local_path().is_none());
        assert_eq!(
            failed.error_detail().as_deref(),
            Some("download failed (HTTP 404): not found")
        );

        let skipped = DownloadOutcome::skipped("C", SkipReason::NoAccessibleAsset);
        assert_eq!(skipped.retries(), 0);
        assert!(!skipped.is_success() && !skipped.is_failure());
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = DownloadOutcome::skipped("C", SkipReason::NoAccessibleAsset);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["deviation_id"], "C");
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "no_accessible_asset");
    }
}
