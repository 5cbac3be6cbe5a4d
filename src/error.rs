//! Error types for the gdrive-dl library.

use thiserror::Error;

/// Errors that can occur while authenticating or downloading.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller-supplied argument was empty or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The client-secret file is missing or malformed.
    #[error("Client secrets error: {0}")]
    Secrets(String),

    /// Authorization, token exchange or refresh failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The Drive API answered with a non-success status.
    #[error("Drive API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The remote answered with something we could not interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], for callers that branch on cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty or malformed input, raised before any I/O.
    InvalidArgument,
    /// Credential could not be obtained or refreshed.
    AuthFailure,
    /// Metadata or media retrieval failed.
    TransportFailure,
    /// Local directory creation or file write failed.
    FilesystemFailure,
}

impl Error {
    /// Returns the category this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::Config(_) => ErrorKind::InvalidArgument,
            Self::Secrets(_) | Self::Auth(_) => ErrorKind::AuthFailure,
            Self::Api { .. } | Self::Protocol(_) | Self::Http(_) => ErrorKind::TransportFailure,
            Self::Io(_) => ErrorKind::FilesystemFailure,
        }
    }
}

/// A specialized `Result` type for gdrive-dl operations.
pub type Result<T> = std::result::Result<T, Error>;
