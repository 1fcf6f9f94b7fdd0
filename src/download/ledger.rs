//! Run accounting.

use std::collections::HashSet;

use serde::Serialize;

use crate::download::outcome::{DownloadOutcome, OutcomeStatus, PageFailure};

/// One failed item in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub deviation_id: String,
    pub reason: String,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_processed: u64,
    /// Items whose file is on disk, including `already_present` ones.
    pub succeeded: u64,
    pub already_present: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Download attempts beyond the first, over all items.
    pub retries: u64,
    pub failures: Vec<FailureEntry>,
    pub page_failures: Vec<PageFailure>,
}

impl RunSummary {
    /// Percentage of processed items that did not fail.
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 100.0;
        }
        (self.total_processed - self.failed) as f64 / self.total_processed as f64 * 100.0
    }

    /// Whether anything was lost: a failed item or a skipped page.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || !self.page_failures.is_empty()
    }
}

/// Ordered record of every outcome in a run.
#[derive(Debug, Default)]
pub struct FailureLedger {
    outcomes: Vec<DownloadOutcome>,
    seen: HashSet<String>,
    page_failures: Vec<PageFailure>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an outcome for this deviation was already recorded.
    pub fn is_recorded(&self, deviation_id: &str) -> bool {
        self.seen.contains(deviation_id)
    }

    /// Append an outcome. A second outcome for the same deviation is
    /// dropped and `false` returned.
    pub fn record(&mut self, outcome: DownloadOutcome) -> bool {
        if !self.seen.insert(outcome.deviation_id.clone()) {
            tracing::warn!("Duplicate outcome for {} ignored", outcome.deviation_id);
            return false;
        }
        self.outcomes.push(outcome);
        true
    }

    pub fn record_page_failure(&mut self, failure: PageFailure) {
        self.page_failures.push(failure);
    }

    pub fn outcomes(&self) -> &[DownloadOutcome] {
        &self.outcomes
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            page_failures: self.page_failures.clone(),
            ..Default::default()
        };

        for outcome in &self.outcomes {
            summary.total_processed += 1;
            summary.retries += outcome.retries() as u64;

            match &outcome.status {
                OutcomeStatus::Succeeded {
                    already_present, ..
                } => {
                    summary.succeeded += 1;
                    if *already_present {
                        summary.already_present += 1;
                    }
                }
                OutcomeStatus::Skipped { .. } => summary.skipped += 1,
                OutcomeStatus::Failed { reason } => {
                    summary.failed += 1;
                    summary.failures.push(FailureEntry {
                        deviation_id: outcome.deviation_id.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::outcome::{ItemFailure, SkipReason};
    use std::path::PathBuf;

    #[test]
    fn test_summary_counts() {
        let mut ledger = FailureLedger::new();
        ledger.record(DownloadOutcome::succeeded("A", PathBuf::from("a.png"), false, 1));
        ledger.record(DownloadOutcome::succeeded("B", PathBuf::from("b.png"), true, 0));
        ledger.record(DownloadOutcome::skipped("C", SkipReason::NoAccessibleAsset));
        ledger.record(DownloadOutcome::failed(
            "D",
            ItemFailure::DownloadError {
                status: Some(500),
                detail: "boom".into(),
            },
            4,
        ));
        ledger.record_page_failure(PageFailure {
            offset: 48,
            detail: "timeout".into(),
        });

        let summary = ledger.summary();
        assert_eq!(summary.total_processed, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.already_present, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retries, 3);
        assert_eq!(summary.failures[0].deviation_id, "D");
        assert_eq!(summary.page_failures.len(), 1);
        assert_eq!(summary.success_rate(), 75.0);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut ledger = FailureLedger::new();
        assert!(ledger.record(DownloadOutcome::skipped("A", SkipReason::NoAccessibleAsset)));
        assert!(ledger.is_recorded("A"));
        assert!(!ledger.record(DownloadOutcome::skipped("A", SkipReason::NoAccessibleAsset)));
        assert_eq!(ledger.outcomes().len(), 1);
    }

    #[test]
    fn test_empty_run() {
        let summary = FailureLedger::new().summary();
        assert_eq!(summary.total_processed, 0);
        assert_eq!(summary.success_rate(), 100.0);
        assert!(!summary.has_failures());
    }
}
