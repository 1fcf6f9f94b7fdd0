//! Download module for collection traversal and file downloading.
//!
//! This module provides:
//! - Collection pagination with retry and page skipping
//! - Atomic media file downloading
//! - Per-item outcomes and the run ledger
//! - The whole-run entry point

pub mod downloader;
pub mod ledger;
pub mod outcome;
pub mod paginator;
pub mod run;

pub use downloader::{write_atomically, Downloader};
pub use ledger::{FailureEntry, FailureLedger, RunSummary};
pub use outcome::{DownloadOutcome, ItemFailure, OutcomeStatus, PageFailure, SkipReason};
pub use paginator::{CollectionPaginator, PaginationCursor};
pub use run::{run, run_with};
