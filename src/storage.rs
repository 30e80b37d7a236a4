//! Cloud storage upload adapter.
//!
//! Uploads session artifacts to a Drive-style object store and returns
//! shareable links. Destination folders resolve by opaque id when the
//! caller already has one, otherwise by name lookup with creation on
//! miss. Uploading the same file twice creates two remote copies; callers
//! own dedup.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::DriveConfig;
use crate::error::{Error, Result};

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Upload seam. The pipeline only ever sees this trait, so tests and
/// credential-less deployments swap the implementation.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload `local_path` as `name` into `folder`, returning a shareable
    /// URL.
    async fn upload(&self, local_path: &Path, name: &str, folder: &str) -> Result<String>;

    /// False when uploads are configured off; the pipeline then skips
    /// upload calls entirely after one warning.
    fn enabled(&self) -> bool {
        true
    }
}

/// Store used when no storage credentials are configured.
pub struct DisabledStore;

#[async_trait]
impl ArtifactStore for DisabledStore {
    async fn upload(&self, _local_path: &Path, name: &str, _folder: &str) -> Result<String> {
        Err(Error::Upload(format!(
            "no storage credentials configured, {name} not uploaded"
        )))
    }

    fn enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

/// Drive REST client with a pre-issued bearer token. Token issuance and
/// refresh happen outside this service.
pub struct DriveStore {
    client: Client,
    config: DriveConfig,
}

impl DriveStore {
    pub fn new(config: DriveConfig, timeout: std::time::Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Resolve a destination to a folder id. Values that already look like
    /// opaque Drive ids pass through; anything else is a folder name,
    /// looked up and created on miss.
    async fn resolve_folder(&self, folder: &str) -> Result<String> {
        if looks_like_folder_id(folder) {
            return Ok(folder.to_string());
        }

        let list_url = self
            .config
            .api_base
            .join("files")
            .map_err(|e| Error::Upload(e.to_string()))?;
        let query = format!(
            "name='{}' and mimeType='{FOLDER_MIME}' and trashed=false",
            folder.replace('\'', "\\'")
        );
        let found: FileList = self
            .client
            .get(list_url.clone())
            .bearer_auth(&self.config.access_token)
            .query(&[("q", query.as_str()), ("fields", "files(id)")])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Upload(format!("folder lookup failed: {e}")))?
            .json()
            .await?;

        if let Some(existing) = found.files.first() {
            debug!(folder, id = %existing.id, "resolved existing folder");
            return Ok(existing.id.clone());
        }

        let created: FileRef = self
            .client
            .post(list_url)
            .bearer_auth(&self.config.access_token)
            .query(&[("fields", "id")])
            .json(&json!({ "name": folder, "mimeType": FOLDER_MIME }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Upload(format!("folder creation failed: {e}")))?
            .json()
            .await?;
        debug!(folder, id = %created.id, "created folder");
        Ok(created.id)
    }

    /// Grant anyone-with-the-link read access so the returned URL is
    /// usable downstream.
    async fn make_public(&self, file_id: &str) -> Result<()> {
        let url = self
            .config
            .api_base
            .join(&format!("files/{file_id}/permissions"))
            .map_err(|e| Error::Upload(e.to_string()))?;
        self.client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Upload(format!("permission grant failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for DriveStore {
    async fn upload(&self, local_path: &Path, name: &str, folder: &str) -> Result<String> {
        let folder_id = self.resolve_folder(folder).await?;
        let bytes = tokio::fs::read(local_path).await?;
        let mime = mime_guess::from_path(name)
            .first_or_octet_stream()
            .to_string();

        // Drive's multipart upload is multipart/related (metadata part
        // followed by the media part), which is assembled by hand here.
        let boundary = format!("assay-{}", uuid::Uuid::new_v4());
        let metadata = json!({ "name": name, "parents": [folder_id] }).to_string();
        let mut body = Vec::with_capacity(bytes.len() + metadata.len() + 256);
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime}\r\n\r\n").as_bytes());
        body.extend_from_slice(&bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let mut upload_url = self
            .config
            .upload_base
            .join("files")
            .map_err(|e| Error::Upload(e.to_string()))?;
        upload_url
            .query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", "id,webViewLink");

        let uploaded: FileRef = self
            .client
            .post(upload_url)
            .bearer_auth(&self.config.access_token)
            .header(
                "content-type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::Upload(format!("upload of {name} failed: {e}")))?
            .json()
            .await?;

        self.make_public(&uploaded.id).await?;

        let link = uploaded
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", uploaded.id));
        info!(file = name, url = %link, "uploaded artifact");
        Ok(link)
    }
}

/// Drive ids are long, unspaced, URL-safe tokens; session folder names are
/// not. The heuristic errs toward name lookup.
fn looks_like_folder_id(value: &str) -> bool {
    value.len() >= 25
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_id_heuristic() {
        assert!(looks_like_folder_id("1A2b3C4d5E6f7G8h9I0jKlMnOpQrStUvW"));
        assert!(!looks_like_folder_id("session-42"));
        assert!(!looks_like_folder_id("My Session Folder"));
        assert!(!looks_like_folder_id(""));
    }

    #[tokio::test]
    async fn disabled_store_reports_missing_credentials() {
        let store = DisabledStore;
        assert!(!store.enabled());
        let result = store
            .upload(Path::new("/tmp/x.csv"), "x.csv", "folder")
            .await;
        assert!(matches!(result, Err(Error::Upload(_))));
    }
}
