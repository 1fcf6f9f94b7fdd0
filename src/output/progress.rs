//! Progress bars for large downloads.

use indicatif::{ProgressBar, ProgressStyle};

/// Byte progress for one file, labelled with its name.
pub fn create_download_bar(total: u64, name: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:30!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})")
            .unwrap()
            .progress_chars("=> "),
    );
    bar.set_message(name.to_string());
    bar
}
