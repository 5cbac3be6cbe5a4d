//! Authenticated single-file access to Google Drive.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Authenticator;
use crate::config::{DRIVE_READONLY_SCOPE, FetcherConfig};
use crate::download::{ConsoleProgress, DownloadProgress, MediaDownload};
use crate::drive::{DriveApi, FileMetadata, GoogleDriveClient};
use crate::error::{Error, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::oauth::{ClientSecretsFileFlow, OAuthFlow};
use crate::stats::FileStats;
use crate::store::{CredentialStore, FileCredentialStore};

/// Builds a configured HTTP client for OAuth and Drive requests.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// Outcome of a successful download.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    /// Metadata fetched before the transfer.
    pub metadata: FileMetadata,
    /// Where the bytes were written.
    pub path: PathBuf,
    /// Transfer statistics.
    pub stats: FileStats,
}

/// Fetches metadata and content of individual Drive files.
///
/// Two call surfaces exist. [`fetch_metadata`](Self::fetch_metadata) and
/// [`fetch_file`](Self::fetch_file) return typed errors;
/// [`get_file_metadata`](Self::get_file_metadata) and
/// [`download_file`](Self::download_file) print failures and return
/// `None`/`false` instead. Argument errors always propagate.
pub struct FileFetcher<D: DriveApi = GoogleDriveClient, F: FileSystem = TokioFileSystem> {
    api: D,
    fs: F,
    config: FetcherConfig,
    progress: Arc<dyn DownloadProgress>,
}

impl FileFetcher {
    /// Authenticates and builds a fetcher for the real Drive service.
    ///
    /// Uses the token cache when it holds a usable credential, otherwise
    /// runs the browser consent flow with the configured client secrets.
    ///
    /// # Errors
    ///
    /// Returns an `AuthFailure` error if no credential can be obtained.
    pub async fn connect(config: FetcherConfig) -> Result<Self> {
        let http = build_http_client()?;
        let store = FileCredentialStore::new(&config.token_cache_path);
        let flow = ClientSecretsFileFlow::new(
            &config.client_secrets_path,
            vec![DRIVE_READONLY_SCOPE.to_string()],
            http.clone(),
        )
        .with_timeout(config.consent_timeout())
        .with_open_browser(config.open_browser);

        Self::connect_with(config, store, flow, http).await
    }

    /// Authenticates through the given store and flow.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn connect_with<S, O>(
        config: FetcherConfig,
        store: S,
        flow: O,
        http: reqwest::Client,
    ) -> Result<Self>
    where
        S: CredentialStore,
        O: OAuthFlow,
    {
        let credential = Authenticator::new(store, flow).authenticate().await?;
        log::info!("Authenticated with Google Drive");
        Ok(Self::with_api(
            GoogleDriveClient::new(http, credential.access_token),
            config,
        ))
    }
}

impl<D: DriveApi> FileFetcher<D, TokioFileSystem> {
    /// Wraps an already-authenticated Drive handle.
    #[must_use]
    pub fn with_api(api: D, config: FetcherConfig) -> Self {
        Self {
            api,
            fs: TokioFileSystem,
            config,
            progress: Arc::new(ConsoleProgress),
        }
    }
}

impl<D: DriveApi, F: FileSystem> FileFetcher<D, F> {
    /// Replaces the file system implementation.
    #[must_use]
    pub fn with_fs<G: FileSystem>(self, fs: G) -> FileFetcher<D, G> {
        FileFetcher {
            api: self.api,
            fs,
            config: self.config,
            progress: self.progress,
        }
    }

    /// Replaces the progress reporter. Defaults to [`ConsoleProgress`].
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn DownloadProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Returns a reference to the Drive handle.
    #[must_use]
    pub const fn api(&self) -> &D {
        &self.api
    }

    /// Returns a reference to the configuration.
    #[must_use]
    pub const fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetches metadata for `file_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty ID, or the transport
    /// error of the failed request.
    pub async fn fetch_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        require_file_id(file_id)?;
        self.api.file_metadata(file_id).await
    }

    /// Fetches metadata for `file_id`, printing any remote failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty ID. Every other
    /// failure yields `Ok(None)`.
    pub async fn get_file_metadata(&self, file_id: &str) -> Result<Option<FileMetadata>> {
        require_file_id(file_id)?;
        match self.api.file_metadata(file_id).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                log::error!("Metadata request for {file_id} failed: {e}");
                println!("Error getting file metadata: {e}");
                Ok(None)
            }
        }
    }

    /// Downloads `file_id` to `output_path`.
    ///
    /// Missing parent directories are created and an existing file is
    /// overwritten. Nothing is written unless every chunk arrived.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty ID or path, or the
    /// error of the failed step.
    pub async fn fetch_file(
        &self,
        file_id: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<DownloadReport> {
        let path = output_path.as_ref();
        require_file_id(file_id)?;
        require_output_path(path)?;

        let metadata = self.fetch_metadata(file_id).await?;
        self.transfer(file_id, path, metadata).await
    }

    /// Downloads `file_id` to `output_path` using metadata fetched earlier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty ID or path, or the
    /// error of the failed step.
    pub async fn fetch_file_with(
        &self,
        file_id: &str,
        metadata: FileMetadata,
        output_path: impl AsRef<Path>,
    ) -> Result<DownloadReport> {
        let path = output_path.as_ref();
        require_file_id(file_id)?;
        require_output_path(path)?;

        self.transfer(file_id, path, metadata).await
    }

    /// Downloads `file_id` to `output_path`, printing any failure.
    ///
    /// Returns `Ok(true)` once the file is written. Returns `Ok(false)`
    /// without touching the disk if metadata cannot be fetched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty ID or path. Every
    /// other failure yields `Ok(false)`.
    pub async fn download_file(&self, file_id: &str, output_path: impl AsRef<Path>) -> Result<bool> {
        let path = output_path.as_ref();
        require_file_id(file_id)?;
        require_output_path(path)?;

        let Some(metadata) = self.get_file_metadata(file_id).await? else {
            return Ok(false);
        };

        match self.transfer(file_id, path, metadata).await {
            Ok(_) => Ok(true),
            Err(e) => {
                println!("Error downloading file: {e}");
                Ok(false)
            }
        }
    }

    /// Renders metadata as a human-readable summary.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn format_metadata(&self, metadata: Option<&FileMetadata>) -> String {
        crate::format::format_metadata(metadata)
    }

    async fn transfer(
        &self,
        file_id: &str,
        path: &Path,
        metadata: FileMetadata,
    ) -> Result<DownloadReport> {
        let result = self.transfer_inner(file_id, path, metadata).await;
        if let Err(e) = &result {
            log::error!("Download of {file_id} failed: {e}");
            self.progress.on_error(e);
        }
        result
    }

    async fn transfer_inner(
        &self,
        file_id: &str,
        path: &Path,
        metadata: FileMetadata,
    ) -> Result<DownloadReport> {
        self.progress.on_start(&metadata);

        let mut download = MediaDownload::new(&self.api, file_id, self.config.chunk_size);
        while let Some(status) = download.next_chunk().await? {
            self.progress.on_chunk(&status);
        }
        let (bytes, stats) = download.finish();
        self.progress.on_complete(&stats);

        self.ensure_parent_dir(path).await?;
        self.fs.write_file(path, &bytes).await?;
        log::info!("Wrote {} bytes to {}", bytes.len(), path.display());

        Ok(DownloadReport {
            metadata,
            path: path.to_path_buf(),
            stats,
        })
    }

    /// Ensures the parent directory exists for a file path.
    async fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs.create_dir_all(parent).await?;
        }
        Ok(())
    }
}

fn require_file_id(file_id: &str) -> Result<()> {
    if file_id.is_empty() {
        return Err(Error::InvalidArgument("file ID must not be empty".into()));
    }
    Ok(())
}

fn require_output_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("output path must not be empty".into()));
    }
    Ok(())
}
