//! Credential persistence between process runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::credential::Credential;
use crate::error::{Error, Result};

/// Storage for the cached [`Credential`].
///
/// Lifecycle: `init` once before use, then any number of `read`/`write`
/// calls, and `teardown` to discard the stored state.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Prepares the backing storage.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Returns the stored credential, or `None` if nothing usable is stored.
    async fn read(&self) -> Result<Option<Credential>>;

    /// Replaces the stored credential.
    async fn write(&self, credential: &Credential) -> Result<()>;

    /// Removes any stored credential.
    async fn teardown(&self) -> Result<()>;
}

/// Stores the credential as plaintext JSON in a single file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn init(&self) -> Result<()> {
        if let Some(parent) = self.parent_dir() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn read(&self) -> Result<Option<Credential>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        // A corrupt cache only costs a fresh consent.
        match serde_json::from_slice(&contents) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable token cache {}: {e}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    /// Writes atomically (write tmp + rename), owner-only on Unix.
    async fn write(&self, credential: &Credential) -> Result<()> {
        self.init().await?;

        let json = serde_json::to_string_pretty(credential)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp_path, perms).await?;
        }

        tokio::fs::rename(&tmp_path, &self.path).await?;
        log::debug!("Saved credential to {}", self.path.display());
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Keeps the credential in memory only.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `credential`.
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read(&self) -> Result<Option<Credential>> {
        Ok(self.credential.lock().await.clone())
    }

    async fn write(&self, credential: &Credential) -> Result<()> {
        *self.credential.lock().await = Some(credential.clone());
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        self.credential.lock().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::tests::credential;
    use tempfile::TempDir;

    #[tokio::test]
    async fn file_store_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("token.json"));
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested/token.json"));
        store.init().await.unwrap();

        let cred = credential(Some(3600), Some("refresh"));
        store.write(&cred).await.unwrap();

        assert_eq!(store.read().await.unwrap(), Some(cred));
        assert!(!dir.path().join("nested/token.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("token.json"));

        store.write(&credential(Some(10), None)).await.unwrap();
        let mut newer = credential(Some(3600), Some("refresh"));
        newer.access_token = "ya29.newer".to_string();
        store.write(&newer).await.unwrap();

        let stored = store.read().await.unwrap().unwrap();
        assert_eq!(stored.access_token, "ya29.newer");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        let store = FileCredentialStore::new(&path);
        store.write(&credential(None, None)).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn file_store_corrupt_cache_reads_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, b"\x80\x04pickle").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_teardown_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        let store = FileCredentialStore::new(&path);
        store.write(&credential(None, None)).await.unwrap();

        store.teardown().await.unwrap();
        assert!(!path.exists());
        // Tearing down twice is fine.
        store.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_lifecycle() {
        let store = MemoryCredentialStore::new();
        store.init().await.unwrap();
        assert!(store.read().await.unwrap().is_none());

        let cred = credential(Some(3600), None);
        store.write(&cred).await.unwrap();
        assert_eq!(store.read().await.unwrap(), Some(cred));

        store.teardown().await.unwrap();
        assert!(store.read().await.unwrap().is_none());
    }
}
