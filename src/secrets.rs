//! Client-secret file as exported from the cloud console.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client configuration for an installed (desktop) application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret. Desktop clients may omit it when using PKCE.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Authorization endpoint.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Redirect URIs registered for the client.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parses the console JSON export. Either an `installed` or a `web`
    /// section must be present; `installed` wins when both are.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Secrets`] if the JSON is malformed or has neither section.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SecretsFile =
            serde_json::from_str(json).map_err(|e| Error::Secrets(e.to_string()))?;
        let secrets = file.installed.or(file.web).ok_or_else(|| {
            Error::Secrets("expected an \"installed\" or \"web\" client section".into())
        })?;
        if secrets.client_id.is_empty() {
            return Err(Error::Secrets("client_id is empty".into()));
        }
        Ok(secrets)
    }

    /// Reads and parses a client-secret file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Secrets`] if the file is missing, unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Secrets(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTALLED: &str = r#"{
        "installed": {
            "client_id": "123.apps.googleusercontent.com",
            "project_id": "demo",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_secret": "shh",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    #[test]
    fn parses_installed_section() {
        let secrets = ClientSecrets::from_json(INSTALLED).unwrap();
        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret.as_deref(), Some("shh"));
        assert_eq!(secrets.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(secrets.redirect_uris, vec!["http://localhost".to_string()]);
    }

    #[test]
    fn parses_web_section_with_defaults() {
        let secrets = ClientSecrets::from_json(r#"{"web": {"client_id": "abc"}}"#).unwrap();
        assert_eq!(secrets.client_id, "abc");
        assert!(secrets.client_secret.is_none());
        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn rejects_unknown_layout() {
        let err = ClientSecrets::from_json(r#"{"service_account": {}}"#).unwrap_err();
        assert!(matches!(err, Error::Secrets(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            ClientSecrets::from_json("{not json"),
            Err(Error::Secrets(_))
        ));
    }

    #[test]
    fn missing_file_is_a_secrets_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ClientSecrets::load(&dir.path().join("credentials.json")).unwrap_err();
        assert!(matches!(err, Error::Secrets(_)));
        assert_eq!(err.kind(), crate::ErrorKind::AuthFailure);
    }
}
