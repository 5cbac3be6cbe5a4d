//! Google Drive v3 metadata and media endpoints.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::{Error, Result};

/// Drive API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Field set requested for file metadata.
pub const METADATA_FIELDS: &str = "id,name,mimeType,size,modifiedTime,owners,shared";

/// An owner entry of a Drive file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    /// Owner's display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Owner's email address (only present when the API includes it).
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Snapshot of a file's descriptive attributes.
///
/// Every field other than `id` may be absent from the API response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// File ID.
    #[serde(default)]
    pub id: String,
    /// File name.
    #[serde(default)]
    pub name: Option<String>,
    /// MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes. The API sends it as a decimal string.
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
    /// Last modification time, exactly as sent by the API.
    #[serde(default)]
    pub modified_time: Option<String>,
    /// File owners.
    #[serde(default)]
    pub owners: Vec<Owner>,
    /// Whether the file is shared.
    #[serde(default)]
    pub shared: Option<bool>,
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Bytes returned by one ranged media request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaChunk {
    /// Body bytes, in file order.
    pub bytes: Bytes,
    /// Full file size, when the response disclosed it.
    pub total_size: Option<u64>,
}

/// Authenticated handle to the remote file service.
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Fetches metadata for `file_id` with the [`METADATA_FIELDS`] field set.
    async fn file_metadata(&self, file_id: &str) -> Result<FileMetadata>;

    /// Fetches bytes `start..=end` of the file's content.
    async fn media_range(&self, file_id: &str, start: u64, end: u64) -> Result<MediaChunk>;
}

/// [`DriveApi`] over HTTPS with a bearer token.
pub struct GoogleDriveClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GoogleDriveClient {
    /// Creates a client that authorizes requests with `access_token`.
    #[must_use]
    pub fn new(http: reqwest::Client, access_token: String) -> Self {
        Self {
            http,
            access_token,
            base_url: DRIVE_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn file_url(&self, file_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Protocol(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| Error::Protocol("base URL cannot have a path".into()))?
            .pop_if_empty()
            .push("files")
            .push(file_id);
        Ok(url)
    }
}

#[async_trait]
impl DriveApi for GoogleDriveClient {
    async fn file_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        let url = self.file_url(file_id)?;
        log::debug!("Fetching metadata for {file_id}");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", METADATA_FIELDS)])
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn media_range(&self, file_id: &str, start: u64, end: u64) -> Result<MediaChunk> {
        let url = self.file_url(file_id)?;
        log::debug!("Fetching bytes {start}-{end} of {file_id}");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("alt", "media")])
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await?;

        // Past the end (or on an empty file) any range answers 416, usually
        // with `bytes */<total>`.
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(MediaChunk {
                bytes: Bytes::new(),
                total_size: content_range_total(&response),
            });
        }

        let response = check_status(response).await?;
        let partial = response.status() == StatusCode::PARTIAL_CONTENT;
        let total_size = if partial {
            content_range_total(&response)
        } else {
            header_u64(&response, CONTENT_LENGTH.as_str())
        };
        let bytes = response.bytes().await?;

        // A full 200 body is the whole file. A 206 with `/*` leaves it unknown.
        let total_size = if partial {
            total_size
        } else {
            total_size.or(Some(bytes.len() as u64))
        };
        Ok(MediaChunk { bytes, total_size })
    }
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Total size from `Content-Range: bytes 0-99/1234` (or `bytes */1234`).
fn content_range_total(response: &reqwest::Response) -> Option<u64> {
    let value = response.headers().get(CONTENT_RANGE)?.to_str().ok()?;
    parse_content_range_total(value)
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body).map_or_else(
        |_| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.clone()
            }
        },
        |parsed| parsed.error.message,
    );
    log::warn!("Drive API request failed: status={status}");
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}
