//! gdrive-dl - A library for downloading single files from Google Drive.
//!
//! Authenticates with an OAuth installed-app flow (cached in a token file),
//! fetches file metadata, and downloads file content in ranged chunks with
//! progress reporting.
//!
//! # Example
//!
//! ```no_run
//! use gdrive_dl::{FetcherConfig, FileFetcher};
//!
//! # async fn example() -> gdrive_dl::Result<()> {
//! // Uses token.json if present, otherwise opens a browser for consent
//! let fetcher = FileFetcher::connect(FetcherConfig::default()).await?;
//!
//! let metadata = fetcher.get_file_metadata("1AbC...").await?;
//! println!("{}", fetcher.format_metadata(metadata.as_ref()));
//!
//! if fetcher.download_file("1AbC...", "downloads/report.pdf").await? {
//!     println!("saved");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod credential;
pub mod download;
pub mod drive;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod fs;
pub mod oauth;
pub mod secrets;
pub mod stats;
pub mod store;
pub mod url;

// Re-export main types for convenience
pub use auth::Authenticator;
pub use config::{DEFAULT_CHUNK_SIZE, DRIVE_READONLY_SCOPE, FetcherConfig};
pub use credential::Credential;
pub use download::{ConsoleProgress, DownloadProgress, DownloadStatus, MediaDownload, NoProgress};
pub use drive::{DriveApi, FileMetadata, GoogleDriveClient, Owner};
pub use error::{Error, ErrorKind, Result};
pub use fetcher::{DownloadReport, FileFetcher};
pub use format::{format_bytes, format_duration, format_metadata};
pub use fs::{FileSystem, TokioFileSystem};
pub use oauth::{ClientSecretsFileFlow, InstalledAppFlow, OAuthFlow};
pub use secrets::ClientSecrets;
pub use stats::FileStats;
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use crate::url::extract_file_id;
