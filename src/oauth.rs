//! OAuth 2.0 installed-app flow with PKCE and a loopback redirect.
//!
//! The consent flow binds a listener on `127.0.0.1:0`, sends the user to the
//! authorization endpoint (opening a browser when possible), waits for the
//! single redirect carrying the authorization code, and exchanges it for a
//! [`Credential`]. Token values are never logged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use url::Url;

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::secrets::ClientSecrets;

const SUCCESS_PAGE: &str = "<html><body><p>The authentication flow has completed. \
     You may close this window.</p></body></html>";

const DENIED_PAGE: &str = "<html><body><p>Authorization was denied.</p></body></html>";

/// Source of new or refreshed credentials.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Exchanges the credential's refresh token for a new access token.
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;

    /// Runs the interactive consent flow.
    async fn consent(&self) -> Result<Credential>;
}

/// PKCE code verifier plus the CSRF `state` value for one authorization.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generates a fresh random verifier and state.
    #[must_use]
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);

        Self {
            verifier: URL_SAFE_NO_PAD.encode(verifier_bytes),
            state: URL_SAFE_NO_PAD.encode(state_bytes),
        }
    }

    /// The code verifier sent with the token exchange.
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The `state` parameter echoed back by the redirect.
    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 challenge: `BASE64URL(SHA256(verifier))`.
    #[must_use]
    pub fn challenge(&self) -> String {
        let hash = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Installed-app authorization against the endpoints in a [`ClientSecrets`].
pub struct InstalledAppFlow {
    secrets: ClientSecrets,
    scopes: Vec<String>,
    http: reqwest::Client,
    timeout: Duration,
    open_browser: bool,
}

impl InstalledAppFlow {
    /// Creates a flow for `scopes` using the given client configuration.
    #[must_use]
    pub fn new(secrets: ClientSecrets, scopes: Vec<String>, http: reqwest::Client) -> Self {
        Self {
            secrets,
            scopes,
            http,
            timeout: Duration::from_secs(60),
            open_browser: true,
        }
    }

    /// Loads the client configuration from a client-secret file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Secrets`] if the file is missing or malformed.
    pub fn from_client_secrets_file(
        path: &Path,
        scopes: Vec<String>,
        http: reqwest::Client,
    ) -> Result<Self> {
        Ok(Self::new(ClientSecrets::load(path)?, scopes, http))
    }

    /// Sets how long to wait for the consent redirect.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether to try opening a browser on the consent URL.
    #[must_use]
    pub const fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    /// Builds the URL the user visits to grant access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Secrets`] if the configured `auth_uri` is not a URL.
    pub fn authorization_url(&self, redirect_uri: &str, pkce: &PkceVerifier) -> Result<String> {
        let mut url = Url::parse(&self.secrets.auth_uri)
            .map_err(|e| Error::Secrets(format!("invalid auth_uri: {e}")))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.secrets.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", pkce.state())
            .append_pair("code_challenge", &pkce.challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(url.into())
    }

    /// Exchanges an authorization code for a credential.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the token endpoint is unreachable or rejects the code.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce: &PkceVerifier,
    ) -> Result<Credential> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);
        params.insert("client_id", self.secrets.client_id.as_str());
        params.insert("code_verifier", pkce.verifier());
        if let Some(secret) = self.secrets.client_secret.as_deref() {
            params.insert("client_secret", secret);
        }

        log::debug!("Exchanging authorization code for tokens");
        let token = post_token(&self.http, &self.secrets.token_uri, &params).await?;

        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            token_uri: self.secrets.token_uri.clone(),
            client_id: self.secrets.client_id.clone(),
            client_secret: self.secrets.client_secret.clone(),
            scopes: token.scope.map_or_else(
                || self.scopes.clone(),
                |s| s.split_whitespace().map(str::to_string).collect(),
            ),
        })
    }

    /// Runs the full consent flow on a loopback listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the user denies access, the redirect does
    /// not arrive within the timeout, or the code exchange fails.
    pub async fn run_local_server(&self) -> Result<Credential> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| Error::Auth(format!("cannot bind redirect listener: {e}")))?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");

        let pkce = PkceVerifier::new();
        let auth_url = self.authorization_url(&redirect_uri, &pkce)?;

        println!("Please visit this URL to authorize this application: {auth_url}");
        if self.open_browser
            && let Err(e) = open::that(&auth_url)
        {
            log::warn!("Could not open a browser: {e}");
        }

        let code = tokio::time::timeout(self.timeout, wait_for_callback(listener, pkce.state()))
            .await
            .map_err(|_| {
                Error::Auth(format!(
                    "timed out after {}s waiting for authorization",
                    self.timeout.as_secs()
                ))
            })??;

        self.exchange_code(&code, &redirect_uri, &pkce).await
    }
}

#[async_trait]
impl OAuthFlow for InstalledAppFlow {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        refresh_credential(&self.http, credential).await
    }

    async fn consent(&self) -> Result<Credential> {
        self.run_local_server().await
    }
}

/// Installed-app flow that reads the client-secret file only when consent
/// is needed. Refresh uses the client details stored in the credential.
pub struct ClientSecretsFileFlow {
    path: PathBuf,
    scopes: Vec<String>,
    http: reqwest::Client,
    timeout: Duration,
    open_browser: bool,
}

impl ClientSecretsFileFlow {
    /// Creates a flow backed by the client-secret file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, scopes: Vec<String>, http: reqwest::Client) -> Self {
        Self {
            path: path.into(),
            scopes,
            http,
            timeout: Duration::from_secs(60),
            open_browser: true,
        }
    }

    /// Sets how long to wait for the consent redirect.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether to try opening a browser on the consent URL.
    #[must_use]
    pub const fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }
}

#[async_trait]
impl OAuthFlow for ClientSecretsFileFlow {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        refresh_credential(&self.http, credential).await
    }

    async fn consent(&self) -> Result<Credential> {
        InstalledAppFlow::from_client_secrets_file(&self.path, self.scopes.clone(), self.http.clone())?
            .with_timeout(self.timeout)
            .with_open_browser(self.open_browser)
            .run_local_server()
            .await
    }
}

/// Exchanges the credential's refresh token at its token endpoint.
///
/// The endpoint usually omits a new refresh token; the old one is kept then.
///
/// # Errors
///
/// Returns [`Error::Auth`] if the credential has no refresh token or the
/// endpoint rejects it.
pub async fn refresh_credential(http: &reqwest::Client, credential: &Credential) -> Result<Credential> {
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or_else(|| Error::Auth("credential has no refresh token".into()))?;

    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", refresh_token);
    params.insert("client_id", credential.client_id.as_str());
    if let Some(secret) = credential.client_secret.as_deref() {
        params.insert("client_secret", secret);
    }

    log::debug!("Refreshing access token");
    let token = post_token(http, &credential.token_uri, &params).await?;

    let mut refreshed = credential.clone();
    refreshed.access_token = token.access_token;
    refreshed.expires_at = token
        .expires_in
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
    if let Some(new_refresh) = token.refresh_token {
        refreshed.refresh_token = Some(new_refresh);
    }
    Ok(refreshed)
}

async fn post_token(
    http: &reqwest::Client,
    token_uri: &str,
    params: &HashMap<&str, &str>,
) -> Result<TokenResponse> {
    let body = serde_urlencoded::to_string(params)
        .map_err(|e| Error::Auth(format!("failed to encode token request: {e}")))?;

    let response = http
        .post(token_uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await
        .map_err(|e| Error::Auth(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        log::warn!("Token endpoint returned {status}");
        return Err(Error::Auth(format!(
            "token endpoint returned {}: {text}",
            status.as_u16()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Auth(format!("failed to parse token response: {e}")))
}

/// What a single redirect request carried.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Denied(String),
    /// Carries a code or error but not our `state`.
    Forged,
    Ignored,
}

/// Classifies the query parameters of a redirect request.
fn parse_callback(params: &HashMap<String, String>, expected_state: &str) -> Callback {
    let has_outcome = params.contains_key("code") || params.contains_key("error");
    if !has_outcome {
        return Callback::Ignored;
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Callback::Forged;
    }
    if let Some(error) = params.get("error") {
        return Callback::Denied(error.clone());
    }
    params
        .get("code")
        .map_or(Callback::Ignored, |code| Callback::Code(code.clone()))
}

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    outcome: mpsc::Sender<Result<String>>,
}

async fn redirect(
    State(state): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    match parse_callback(&params, &state.expected_state) {
        Callback::Ignored => (StatusCode::NOT_FOUND, Html("")),
        Callback::Forged => {
            log::warn!("Ignoring redirect with unexpected state");
            (StatusCode::BAD_REQUEST, Html(""))
        }
        Callback::Denied(reason) => {
            let _ = state
                .outcome
                .send(Err(Error::Auth(format!("authorization denied: {reason}"))))
                .await;
            (StatusCode::OK, Html(DENIED_PAGE))
        }
        Callback::Code(code) => {
            let _ = state.outcome.send(Ok(code)).await;
            (StatusCode::OK, Html(SUCCESS_PAGE))
        }
    }
}

/// Serves the redirect route until a request carries the authorization
/// code or a denial with the expected `state`.
async fn wait_for_callback(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (tx, mut rx) = mpsc::channel(1);
    let app = Router::new().route("/", get(redirect)).with_state(RedirectState {
        expected_state: Arc::from(expected_state),
        outcome: tx,
    });

    tokio::select! {
        outcome = rx.recv() => {
            outcome.unwrap_or_else(|| Err(Error::Auth("redirect listener closed".into())))
        }
        served = async { axum::serve(listener, app).await } => {
            Err(Error::Auth(match served {
                Ok(()) => "redirect listener stopped".to_string(),
                Err(e) => format!("redirect listener failed: {e}"),
            }))
        }
    }
}
