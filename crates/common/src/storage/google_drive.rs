//! Google Drive file store
//!
//! Authenticates as a service account (JWT bearer grant) and talks to the
//! Drive v3 REST API. All calls pass `supportsAllDrives` so the root folder
//! may live in the service account's own drive or in a shared drive.

use super::{FileStore, FolderScope, UploadError, UploadResult, UploadStep};
use crate::config::DriveConfig;
use crate::errors::AppError;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh a cached token this long before it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The parts of a service-account key file we need
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileMeta {
    id: String,
    #[serde(default)]
    drive_id: Option<String>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFileMeta>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFile<'a> {
    name: &'a str,
    mime_type: &'a str,
    parents: [&'a str; 1],
}

#[derive(Serialize)]
struct Permission {
    role: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Drive v3 backed [`FileStore`]
pub struct GoogleDriveStore {
    client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    token_uri: String,
    api_base: String,
    upload_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleDriveStore {
    /// Build the store from configuration; the key is read once here
    pub fn from_config(config: &DriveConfig) -> Result<Self, AppError> {
        let raw = match (&config.credentials_json, &config.credentials_path) {
            (Some(json), _) if !json.trim().is_empty() => json.clone(),
            (_, Some(path)) => std::fs::read_to_string(path).map_err(|e| AppError::Configuration {
                message: format!("Cannot read Drive credentials {}: {}", path, e),
            })?,
            _ => {
                return Err(AppError::Configuration {
                    message: "Google Drive credentials missing".to_string(),
                })
            }
        };

        let key: ServiceAccountKey =
            serde_json::from_str(&raw).map_err(|e| AppError::Configuration {
                message: format!("Invalid Drive credentials: {}", e),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Self::new(client, key, config)
    }

    pub fn new(client: reqwest::Client, key: ServiceAccountKey, config: &DriveConfig) -> Result<Self, AppError> {
        let encoding_key =
            EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| AppError::Configuration {
                message: format!("Invalid Drive private key: {}", e),
            })?;

        let token_uri = config
            .token_uri
            .clone()
            .or_else(|| key.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        Ok(Self {
            client,
            key,
            encoding_key,
            token_uri,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    /// Cached access token, refreshed shortly before expiry
    async fn access_token(&self) -> UploadResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn fetch_token(&self) -> UploadResult<CachedToken> {
        let auth_error = |message: String| UploadError::new(UploadStep::Authenticate, message);

        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| auth_error(format!("Failed to sign assertion: {}", e)))?;

        let request = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())]);
        let response: TokenResponse = send_json(request, UploadStep::Authenticate).await?;

        let lifetime = response.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64);
        tracing::debug!(expires_in = lifetime, "Obtained Drive access token");

        Ok(CachedToken {
            value: response.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }

    async fn authorized(&self, request: RequestBuilder) -> UploadResult<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(request.bearer_auth(token))
    }
}

/// Send a request and decode the JSON body, tagging failures with `step`
async fn send_json<T: DeserializeOwned>(request: RequestBuilder, step: UploadStep) -> UploadResult<T> {
    let response = send(request, step).await?;
    response
        .json()
        .await
        .map_err(|e| UploadError::new(step, format!("Failed to parse response: {}", e)))
}

async fn send(request: RequestBuilder, step: UploadStep) -> UploadResult<reqwest::Response> {
    let response = request.send().await.map_err(|e| {
        let step = if e.is_timeout() { UploadStep::Timeout } else { step };
        UploadError::new(step, format!("Request failed: {}", e))
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UploadError::new(step, format!("API error {}: {}", status, body)));
    }
    Ok(response)
}

/// Escape a value for use inside a single-quoted Drive query literal
fn query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Drive search expression for a child folder with an exact name
pub fn folder_query(parent_id: &str, name: &str) -> String {
    format!(
        "name = '{}' and mimeType = '{}' and '{}' in parents and trashed = false",
        query_literal(name),
        FOLDER_MIME_TYPE,
        query_literal(parent_id),
    )
}

/// Query parameters for a folder search, scoped to the root's drive
pub fn folder_search_params(
    scope: &FolderScope,
    parent_id: &str,
    name: &str,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", folder_query(parent_id, name)),
        ("fields", "files(id)".to_string()),
        ("pageSize", "10".to_string()),
        ("supportsAllDrives", "true".to_string()),
        ("includeItemsFromAllDrives", "true".to_string()),
    ];
    match scope {
        FolderScope::SharedDrive { drive_id } => {
            params.push(("corpora", "drive".to_string()));
            params.push(("driveId", drive_id.clone()));
        }
        FolderScope::MyDrive => params.push(("corpora", "user".to_string())),
    }
    params
}

/// Multipart/related body: JSON metadata part followed by the content part
fn multipart_related(boundary: &str, metadata: &serde_json::Value, mime_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 512);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl FileStore for GoogleDriveStore {
    async fn resolve_root(&self, root_id: &str) -> UploadResult<FolderScope> {
        let request = self
            .client
            .get(format!("{}/files/{}", self.api_base, root_id))
            .query(&[("fields", "id,driveId"), ("supportsAllDrives", "true")]);
        let request = self.authorized(request).await?;

        let meta: DriveFileMeta = send_json(request, UploadStep::ResolveRoot).await?;

        Ok(match meta.drive_id {
            Some(drive_id) => FolderScope::SharedDrive { drive_id },
            None => FolderScope::MyDrive,
        })
    }

    async fn find_folder(
        &self,
        scope: &FolderScope,
        parent_id: &str,
        name: &str,
    ) -> UploadResult<Option<String>> {
        let params = folder_search_params(scope, parent_id, name);
        let request = self
            .client
            .get(format!("{}/files", self.api_base))
            .query(&params);
        let request = self.authorized(request).await?;

        let list: FileList = send_json(request, UploadStep::FindFolder).await?;
        if list.files.len() > 1 {
            tracing::warn!(folder = name, count = list.files.len(), "Duplicate customer folders found, using the first");
        }
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> UploadResult<String> {
        let request = self
            .client
            .post(format!("{}/files", self.api_base))
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&NewFile {
                name,
                mime_type: FOLDER_MIME_TYPE,
                parents: [parent_id],
            });
        let request = self.authorized(request).await?;

        let created: DriveFileMeta = send_json(request, UploadStep::CreateFolder).await?;
        Ok(created.id)
    }

    async fn upload_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> UploadResult<String> {
        let boundary = format!("gutachten-{}", Uuid::new_v4().simple());
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [folder_id],
        });
        let body = multipart_related(&boundary, &metadata, mime_type, &content);

        let request = self
            .client
            .post(format!("{}/files", self.upload_base))
            .query(&[("uploadType", "multipart"), ("supportsAllDrives", "true"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body);
        let request = self.authorized(request).await?;

        let uploaded: DriveFileMeta = send_json(request, UploadStep::UploadFile).await?;
        Ok(uploaded.id)
    }

    async fn share_publicly(&self, file_id: &str) -> UploadResult<()> {
        let request = self
            .client
            .post(format!("{}/files/{}/permissions", self.api_base, file_id))
            .query(&[("supportsAllDrives", "true")])
            .json(&Permission {
                role: "reader",
                kind: "anyone",
            });
        let request = self.authorized(request).await?;

        send(request, UploadStep::ShareFile).await?;
        Ok(())
    }

    fn share_link(&self, file_id: &str) -> String {
        format!("https://drive.google.com/file/d/{}/view?usp=sharing", file_id)
    }

    fn backend_name(&self) -> &'static str {
        "google_drive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_query_escapes_quotes() {
        let query = folder_query("root", "O'Brien");
        assert!(query.contains("name = 'O\\'Brien'"));
        assert!(query.contains("'root' in parents"));
        assert!(query.contains("trashed = false"));
    }

    fn param<'a>(params: &'a [(&str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_shared_drive_search_is_scoped_to_the_drive() {
        let scope = FolderScope::SharedDrive {
            drive_id: "0AbcDrive".into(),
        };
        let params = folder_search_params(&scope, "root", "BI-XX 123");

        assert_eq!(param(&params, "corpora"), Some("drive"));
        assert_eq!(param(&params, "driveId"), Some("0AbcDrive"));
        assert_eq!(param(&params, "supportsAllDrives"), Some("true"));
        assert_eq!(param(&params, "includeItemsFromAllDrives"), Some("true"));
        assert_eq!(
            param(&params, "q"),
            Some(folder_query("root", "BI-XX 123").as_str())
        );
    }

    #[test]
    fn test_my_drive_search_uses_user_corpus() {
        let params = folder_search_params(&FolderScope::MyDrive, "root", "BI-XX 123");

        assert_eq!(param(&params, "corpora"), Some("user"));
        assert_eq!(param(&params, "driveId"), None);
    }

    #[test]
    fn test_multipart_body_layout() {
        let metadata = serde_json::json!({ "name": "a.pdf" });
        let body = multipart_related("b1", &metadata, "application/pdf", b"%PDF");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with("--b1\r\nContent-Type: application/json"));
        assert!(text.contains("{\"name\":\"a.pdf\"}"));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n%PDF"));
        assert!(text.ends_with("\r\n--b1--\r\n"));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = DriveConfig {
            root_folder_id: Some("root".into()),
            ..DriveConfig::default()
        };
        assert!(matches!(
            GoogleDriveStore::from_config(&config),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let config = DriveConfig {
            credentials_json: Some(
                r#"{"client_email":"svc@example.iam.gserviceaccount.com","private_key":"not a pem"}"#.into(),
            ),
            root_folder_id: Some("root".into()),
            ..DriveConfig::default()
        };
        assert!(matches!(
            GoogleDriveStore::from_config(&config),
            Err(AppError::Configuration { .. })
        ));
    }
}
