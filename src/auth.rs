//! Obtains a usable credential from the store, a refresh, or user consent.

use crate::credential::Credential;
use crate::error::Result;
use crate::oauth::OAuthFlow;
use crate::store::CredentialStore;

/// Resolves the credential used to build an authenticated Drive client.
pub struct Authenticator<S: CredentialStore, F: OAuthFlow> {
    store: S,
    flow: F,
}

impl<S: CredentialStore, F: OAuthFlow> Authenticator<S, F> {
    /// Creates an authenticator over a credential store and an OAuth flow.
    #[must_use]
    pub const fn new(store: S, flow: F) -> Self {
        Self { store, flow }
    }

    /// Returns a reference to the credential store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns a valid credential.
    ///
    /// A valid cached credential is returned untouched. An expired one with
    /// a refresh token is refreshed; anything else (including a failed
    /// refresh) goes through consent. Refreshed and new credentials are
    /// written back to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if consent fails or the store cannot be read or written.
    pub async fn authenticate(&self) -> Result<Credential> {
        self.store.init().await?;

        let credential = match self.store.read().await? {
            Some(cached) if cached.is_valid() => {
                log::debug!("Using cached credential");
                return Ok(cached);
            }
            Some(cached) if cached.can_refresh() => {
                log::info!("Cached credential expired, refreshing");
                match self.flow.refresh(&cached).await {
                    Ok(refreshed) => refreshed,
                    Err(e) => {
                        log::warn!("Token refresh failed, requesting consent: {e}");
                        self.flow.consent().await?
                    }
                }
            }
            _ => {
                log::info!("No usable cached credential, requesting consent");
                self.flow.consent().await?
            }
        };

        self.store.write(&credential).await?;
        Ok(credential)
    }
}
