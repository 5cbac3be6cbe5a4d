//! Progress bar and summary reporting for CLI downloads.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::{
    DownloadProgress, DownloadReport, DownloadStatus, Error, FileMetadata, FileStats,
    format_bytes, format_duration,
};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Style for a single file download bar.
fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} @ {bytes_per_sec} - {msg}",
    )
    .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("━━╌"))
}

/// Drives an `indicatif` bar from download events.
///
/// Chunks can be large, so the bar jumps once per chunk rather than
/// moving smoothly.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Creates a hidden bar that becomes visible when the download starts.
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        bar.set_style(bar_style());
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadProgress for BarProgress {
    fn on_start(&self, metadata: &FileMetadata) {
        let name = metadata.name.as_deref().unwrap_or("Unknown file");
        self.bar.set_length(metadata.size.unwrap_or(0));
        self.bar.set_message(name.to_string());
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
        self.bar.reset();
    }

    fn on_chunk(&self, status: &DownloadStatus) {
        if let Some(total) = status.total_bytes {
            self.bar.set_length(total);
        }
        self.bar.set_position(status.bytes_so_far);
    }

    fn on_complete(&self, _stats: &FileStats) {
        self.bar.finish_and_clear();
    }

    fn on_error(&self, _error: &Error) {
        self.bar.abandon();
    }
}

/// Prints a summary of a finished download.
pub fn print_summary(report: &DownloadReport) {
    let stats = &report.stats;
    let name = report.metadata.name.as_deref().unwrap_or("Unknown file");

    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");
    println!("  File:              {name}");
    println!("  Saved to:          {}", report.path.display());
    println!("  Total size:        {}", format_bytes(stats.size));
    println!("  Requests:          {}", stats.chunks);
    println!("  Total time:        {}", format_duration(stats.elapsed));
    println!("  Average speed:     {}/s", format_bytes(stats.average_speed));
    println!("  Peak speed:        {}/s", format_bytes(stats.peak_speed));
    println!("{SEPARATOR}");
}
