//! Download statistics types.

use std::time::{Duration, Instant};

/// Statistics for a single file download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// Bytes received.
    pub size: u64,
    /// Number of media requests issued.
    pub chunks: usize,
    /// Time taken to receive all chunks.
    pub elapsed: Duration,
    /// Average download speed in bytes per second.
    pub average_speed: u64,
    /// Fastest single chunk in bytes per second.
    pub peak_speed: u64,
}

/// Tracks per-chunk timing while a download is in progress.
#[derive(Debug)]
pub struct DownloadStatsTracker {
    start_time: Instant,
    last_chunk: Instant,
    downloaded: u64,
    chunks: usize,
    peak_speed: u64,
}

impl Default for DownloadStatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadStatsTracker {
    /// Starts tracking now.
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_chunk: now,
            downloaded: 0,
            chunks: 0,
            peak_speed: 0,
        }
    }

    /// Records a received chunk.
    pub fn record_chunk(&mut self, bytes: u64) {
        let now = Instant::now();
        let speed = bytes_per_sec(bytes, now.duration_since(self.last_chunk));
        self.last_chunk = now;
        self.downloaded += bytes;
        self.chunks += 1;
        self.peak_speed = self.peak_speed.max(speed);
    }

    /// Time since tracking started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Consumes the tracker into final statistics.
    #[must_use]
    pub fn finish(self) -> FileStats {
        let elapsed = self.elapsed();
        FileStats {
            size: self.downloaded,
            chunks: self.chunks,
            elapsed,
            average_speed: bytes_per_sec(self.downloaded, elapsed),
            peak_speed: self.peak_speed,
        }
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bytes_per_sec(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / secs) as u64
    } else {
        0
    }
}
