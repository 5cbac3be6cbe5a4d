//! Chunked media download and progress reporting.

use std::io::Write as _;

use bytes::{Bytes, BytesMut};

use crate::drive::{DriveApi, FileMetadata};
use crate::error::{Error, Result};
use crate::format::whole_megabytes;
use crate::stats::{DownloadStatsTracker, FileStats};

/// Progress of a chunked download after one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadStatus {
    /// Bytes received so far.
    pub bytes_so_far: u64,
    /// Full file size, once known.
    pub total_bytes: Option<u64>,
    /// Whether every byte has been received.
    pub is_done: bool,
}

impl DownloadStatus {
    /// Fraction received in `0.0..=1.0`. Zero while the total is unknown or zero.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn progress(&self) -> f64 {
        match self.total_bytes {
            Some(total) if total > 0 => (self.bytes_so_far as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }

    /// Integer-truncated percentage in `0..=100`.
    #[must_use]
    pub fn percent(&self) -> u8 {
        match self.total_bytes {
            Some(total) if total > 0 => {
                let pct = (u128::from(self.bytes_so_far) * 100 / u128::from(total)).min(100);
                u8::try_from(pct).unwrap_or(100)
            }
            _ => 0,
        }
    }
}

/// Lazy sequence of ranged media requests for one file.
///
/// Each [`next_chunk`](Self::next_chunk) call issues exactly one request and
/// appends the bytes in order. Once done, further calls return `None`.
pub struct MediaDownload<'a, D: DriveApi + ?Sized> {
    api: &'a D,
    file_id: String,
    chunk_size: u64,
    buffer: BytesMut,
    total: Option<u64>,
    done: bool,
    stats: DownloadStatsTracker,
}

impl<'a, D: DriveApi + ?Sized> MediaDownload<'a, D> {
    /// Prepares a download of `file_id` in chunks of `chunk_size` bytes.
    #[must_use]
    pub fn new(api: &'a D, file_id: impl Into<String>, chunk_size: u64) -> Self {
        Self {
            api,
            file_id: file_id.into(),
            chunk_size: chunk_size.max(1),
            buffer: BytesMut::new(),
            total: None,
            done: false,
            stats: DownloadStatsTracker::new(),
        }
    }

    /// Bytes received so far.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Whether the download has finished.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Requests the next chunk.
    ///
    /// Returns `Ok(None)` once the download is done.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the failed request, or
    /// [`Error::Protocol`] if the service returns no bytes before the end.
    pub async fn next_chunk(&mut self) -> Result<Option<DownloadStatus>> {
        if self.done {
            return Ok(None);
        }

        let start = self.received();
        let end = start.saturating_add(self.chunk_size - 1);
        let chunk = self.api.media_range(&self.file_id, start, end).await?;
        let len = chunk.bytes.len() as u64;

        if self.total.is_none() {
            self.total = chunk.total_size;
        }
        self.stats.record_chunk(len);

        if len == 0 && self.total.is_some_and(|total| start < total) {
            return Err(Error::Protocol(format!(
                "empty response at byte {start} of {}",
                self.file_id
            )));
        }
        self.buffer.extend_from_slice(&chunk.bytes);

        let received = self.received();
        self.done = match self.total {
            Some(total) => received >= total,
            // Without a total, a short or empty chunk marks the end.
            None => len < self.chunk_size,
        };
        if self.done && self.total.is_none() {
            self.total = Some(received);
        }
        log::debug!(
            "Received {received}/{} bytes of {}",
            self.total.map_or_else(|| "?".to_string(), |t| t.to_string()),
            self.file_id
        );

        Ok(Some(DownloadStatus {
            bytes_so_far: received,
            total_bytes: self.total,
            is_done: self.done,
        }))
    }

    /// Consumes the download into the assembled bytes and its statistics.
    #[must_use]
    pub fn finish(self) -> (Bytes, FileStats) {
        (self.buffer.freeze(), self.stats.finish())
    }
}

/// Trait for receiving download progress updates.
///
/// All methods have default no-op implementations.
pub trait DownloadProgress: Send + Sync {
    /// Called once metadata is known, before the first media request.
    fn on_start(&self, _metadata: &FileMetadata) {}

    /// Called after every received chunk.
    fn on_chunk(&self, _status: &DownloadStatus) {}

    /// Called when every byte has been received.
    fn on_complete(&self, _stats: &FileStats) {}

    /// Called when the download fails.
    fn on_error(&self, _error: &Error) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Plain progress lines on standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    /// The two lines printed before a download starts.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn start_lines(metadata: &FileMetadata) -> [String; 2] {
        let name = metadata.name.as_deref().unwrap_or("Unknown file");
        let size_mb = whole_megabytes(metadata.size.unwrap_or(0));
        [
            format!("Preparing to download: {name}"),
            format!("File size: {:.2} MB", size_mb as f64),
        ]
    }

    /// The progress text for one status, without the trailing carriage return.
    #[must_use]
    pub fn progress_line(status: &DownloadStatus) -> String {
        format!("Download progress: {}%", status.percent())
    }
}

impl DownloadProgress for ConsoleProgress {
    fn on_start(&self, metadata: &FileMetadata) {
        for line in Self::start_lines(metadata) {
            println!("{line}");
        }
    }

    fn on_chunk(&self, status: &DownloadStatus) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}\r", Self::progress_line(status));
        let _ = stdout.flush();
    }

    fn on_complete(&self, _stats: &FileStats) {
        println!("\nDownload completed!");
    }
}
