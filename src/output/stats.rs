//! Statistics reporting.

use std::path::Path;

use console::style;

use crate::download::RunSummary;

/// Failures listed individually before the rest are only counted.
const MAX_LISTED_FAILURES: usize = 10;

/// Print the end-of-run report.
pub fn print_run_summary(summary: &RunSummary, download_dir: &Path) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Download Summary:").bold());
    println!("  Processed: {}", summary.total_processed);
    println!(
        "  Succeeded: {} ({} already present)",
        style(summary.succeeded).green(),
        summary.already_present
    );
    println!("  Skipped:   {}", style(summary.skipped).yellow());
    if summary.failed > 0 {
        println!("  Failed:    {}", style(summary.failed).red());
    } else {
        println!("  Failed:    {}", summary.failed);
    }
    println!("  Retries:   {}", summary.retries);
    println!("  Success rate: {:.1}%", summary.success_rate());

    if !summary.failures.is_empty() {
        println!();
        println!("{}", style("Failed downloads:").red().bold());
        for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
            println!("  - {}: {}", failure.deviation_id, failure.reason);
        }
        if summary.failures.len() > MAX_LISTED_FAILURES {
            println!(
                "  ... and {} more",
                summary.failures.len() - MAX_LISTED_FAILURES
            );
        }
    }

    if !summary.page_failures.is_empty() {
        println!();
        println!("{}", style("Collection pages not processed:").yellow().bold());
        for failure in &summary.page_failures {
            println!("  - offset {}: {}", failure.offset, failure.detail);
        }
    }

    println!();
    println!("  Files saved to: {}", download_dir.display());
    println!("{}", style("═".repeat(50)).dim());
}
