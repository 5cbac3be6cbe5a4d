//! Human-readable rendering of sizes, durations and file metadata.

use std::fmt::Write;
use std::time::Duration;

use crate::drive::FileMetadata;

const MB: u64 = 1024 * 1024;

/// Whole megabytes in `bytes`, truncated.
#[must_use]
pub const fn whole_megabytes(bytes: u64) -> u64 {
    bytes / MB
}

/// Megabytes in `bytes` as a fraction.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / MB as f64
}

/// Formats a byte count as a human-readable string (B, KB, MB, GB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a duration as a human-readable string (e.g. "5.0s", "1m 05s", "1h 01m 05s").
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:01}s", secs, d.subsec_millis() / 100)
    }
}

/// Renders metadata as the fixed multi-line summary.
///
/// Missing text fields print as `Unknown`, a missing size as `0.00 MB`,
/// missing owners as an empty list.
#[must_use]
pub fn format_metadata(metadata: Option<&FileMetadata>) -> String {
    let Some(meta) = metadata else {
        return "No metadata available".to_string();
    };

    let owners = meta
        .owners
        .iter()
        .map(|o| o.display_name.as_deref().unwrap_or("Unknown"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    let _ = writeln!(out, "File Name: {}", meta.name.as_deref().unwrap_or("Unknown"));
    let _ = writeln!(out, "Type: {}", meta.mime_type.as_deref().unwrap_or("Unknown"));
    let _ = writeln!(out, "Size: {:.2} MB", megabytes(meta.size.unwrap_or(0)));
    let _ = writeln!(
        out,
        "Modified: {}",
        meta.modified_time.as_deref().unwrap_or("Unknown")
    );
    let _ = writeln!(out, "Owner(s): {owners}");
    let _ = write!(
        out,
        "Shared: {}",
        if meta.shared.unwrap_or(false) { "Yes" } else { "No" }
    );
    out
}
