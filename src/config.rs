//! Configuration types for authentication and download operations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Read-only Drive scope requested during consent.
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Default chunk size for media downloads (100 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Configuration for a [`FileFetcher`](crate::FileFetcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Path to the client-secret JSON exported from the cloud console.
    pub client_secrets_path: PathBuf,
    /// Path of the token cache file.
    pub token_cache_path: PathBuf,
    /// Seconds to wait for the browser consent callback.
    pub consent_timeout_secs: u64,
    /// Bytes requested per media chunk.
    pub chunk_size: u64,
    /// Whether to try opening the consent URL in a browser.
    pub open_browser: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            client_secrets_path: PathBuf::from("credentials.json"),
            token_cache_path: PathBuf::from("token.json"),
            consent_timeout_secs: 60,
            chunk_size: DEFAULT_CHUNK_SIZE,
            open_browser: true,
        }
    }
}

impl FetcherConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client-secret file path.
    #[must_use]
    pub fn with_client_secrets_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secrets_path = path.into();
        self
    }

    /// Sets the token cache file path.
    #[must_use]
    pub fn with_token_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_cache_path = path.into();
        self
    }

    /// Sets the consent timeout, rounded down to whole seconds with a
    /// minimum of one second.
    #[must_use]
    pub const fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs();
        self.consent_timeout_secs = if secs == 0 { 1 } else { secs };
        self
    }

    /// Sets the media chunk size in bytes.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets whether the consent URL is opened in a browser.
    #[must_use]
    pub const fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Returns the consent timeout as a [`Duration`].
    #[must_use]
    pub const fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    /// Returns the default location of the configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gdrive-dl")
            .join("config.toml")
    }

    /// Parses a configuration from TOML text. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not valid TOML for this type.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, or from [`default_path`](Self::default_path)
    /// when `path` is `None`.
    ///
    /// An explicit path must exist. A missing default file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                log::info!("Loaded config from {}", path.display());
                Self::from_toml(&text)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::Config(format!("{}: {e}", path.display()))),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if self.consent_timeout_secs == 0 {
            return Err(Error::Config(
                "consent_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = FetcherConfig::default();
        assert_eq!(config.client_secrets_path, PathBuf::from("credentials.json"));
        assert_eq!(config.token_cache_path, PathBuf::from("token.json"));
        assert_eq!(config.consent_timeout(), Duration::from_secs(60));
        assert_eq!(config.chunk_size, 100 * 1024 * 1024);
        assert!(config.open_browser);
    }

    #[test]
    fn consent_timeout_is_at_least_one_second() {
        let config = FetcherConfig::default().with_consent_timeout(Duration::from_millis(500));
        assert_eq!(config.consent_timeout(), Duration::from_secs(1));

        let config = FetcherConfig::default().with_consent_timeout(Duration::from_millis(2500));
        assert_eq!(config.consent_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn builder_pattern() {
        let config = FetcherConfig::new()
            .with_client_secrets_path("secrets/client.json")
            .with_token_cache_path("/tmp/token.json")
            .with_consent_timeout(Duration::from_secs(5))
            .with_chunk_size(1024)
            .with_open_browser(false);

        assert_eq!(
            config.client_secrets_path,
            PathBuf::from("secrets/client.json")
        );
        assert_eq!(config.token_cache_path, PathBuf::from("/tmp/token.json"));
        assert_eq!(config.consent_timeout_secs, 5);
        assert_eq!(config.chunk_size, 1024);
        assert!(!config.open_browser);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = FetcherConfig::from_toml("chunk_size = 4096\n").unwrap();
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.token_cache_path, PathBuf::from("token.json"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = FetcherConfig::from_toml("chunk_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn invalid_toml_is_rejected() {
        assert!(FetcherConfig::from_toml("chunk_size = \"big\"").is_err());
    }

    #[test]
    fn serializes_to_toml() {
        let config = FetcherConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized = FetcherConfig::from_toml(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn load_explicit_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(FetcherConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "open_browser = false\nconsent_timeout_secs = 30\n").unwrap();

        let config = FetcherConfig::load(Some(&path)).unwrap();
        assert!(!config.open_browser);
        assert_eq!(config.consent_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn default_path_is_under_config_dir() {
        let path = FetcherConfig::default_path();
        assert!(path.to_string_lossy().contains("gdrive-dl"));
        assert!(path.ends_with("config.toml"));
    }
}
