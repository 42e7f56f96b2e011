// =============================================================================
// GOOGLE DRIVE CLIENT
// =============================================================================
//
// `DriveProvider` implementation over the Drive v3 REST API:
// - `files.list`  - metadata search (id, name, mimeType only)
// - `files.export` - server-side export of native Google Docs to text/plain
// - `files.get?alt=media` - raw byte download for binary formats
//
// Error mapping follows the query lifecycle: a failed search (or a failed
// token exchange before it) is `ServiceUnavailable` and kills the query;
// failures on per-file calls are `ExtractionFailed` and stay isolated to
// that file. Provider-specific error codes are passed through as text, not
// interpreted, and nothing is retried.

use super::auth::GoogleAuth;
use crate::core::drive::models::{DriveError, FileDescriptor};
use crate::core::drive::DriveProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
}

pub struct GoogleDriveClient {
    client: Client,
    auth: GoogleAuth,
}

impl GoogleDriveClient {
    pub fn new(auth: GoogleAuth) -> Self {
        Self {
            client: Client::new(),
            auth,
        }
    }

    /// Creates a client with credentials from environment variables.
    pub async fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self::new(GoogleAuth::from_env().await?))
    }

    /// Builds the Drive query predicate: substring match on the file name OR
    /// the full text, delegating all actual matching to Drive. The raw query
    /// is passed through untokenized; only the Drive query grammar's escape
    /// characters are handled.
    fn build_search_query(query: &str) -> String {
        let escaped = query.replace('\\', "\\\\").replace('\'', "\\'");
        format!(
            "name contains '{}' or fullText contains '{}'",
            escaped, escaped
        )
    }

    async fn bearer_token(&self) -> Result<String, DriveError> {
        // An unusable credential means the whole provider is unreachable.
        self.auth
            .get_access_token()
            .await
            .map_err(|e| DriveError::ServiceUnavailable(e.to_string()))
    }
}

#[async_trait]
impl DriveProvider for GoogleDriveClient {
    async fn search_files(
        &self,
        query: &str,
        page_size: u32,
    ) -> Result<Vec<FileDescriptor>, DriveError> {
        let token = self.bearer_token().await?;

        tracing::debug!("Drive files.list for query '{}'", query);

        let response = self
            .client
            .get(FILES_ENDPOINT)
            .bearer_auth(&token)
            .query(&[
                ("q", Self::build_search_query(query).as_str()),
                ("pageSize", page_size.to_string().as_str()),
                ("fields", "files(id, name, mimeType)"),
            ])
            .send()
            .await
            .map_err(|e| DriveError::ServiceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DriveError::ServiceUnavailable(format!(
                "Drive search failed ({}): {}",
                status, text
            )));
        }

        let listing: FileListResponse = response
            .json()
            .await
            .map_err(|e| DriveError::ServiceUnavailable(e.to_string()))?;

        Ok(listing
            .files
            .into_iter()
            .map(|f| FileDescriptor {
                id: f.id,
                name: f.name,
                mime_type: f.mime_type,
            })
            .collect())
    }

    async fn export_text(&self, file_id: &str) -> Result<String, DriveError> {
        let token = self.bearer_token().await?;
        let url = format!("{}/{}/export", FILES_ENDPOINT, file_id);

        tracing::debug!("Drive files.export for {}", file_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("mimeType", "text/plain")])
            .send()
            .await
            .map_err(|e| DriveError::ExtractionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DriveError::ExtractionFailed(format!(
                "export rejected ({}): {}",
                status, text
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DriveError::ExtractionFailed(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let token = self.bearer_token().await?;
        let url = format!("{}/{}", FILES_ENDPOINT, file_id);

        tracing::debug!("Drive media download for {}", file_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| DriveError::ExtractionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DriveError::ExtractionFailed(format!(
                "download rejected ({}): {}",
                status, text
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DriveError::ExtractionFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
