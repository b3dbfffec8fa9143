//! Thin client for the object store backend (Backblaze B2).
//!
//! A small trait wraps the two B2 calls the Upload Worker needs (authorize,
//! upload) so production code and tests share one interface, the same split
//! `CameraSource` uses in `capture/source.rs`.

use crate::config::BackblazeConfig;
use crate::error::{PenareiaError, Result, UploadError};
use async_trait::async_trait;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::time::Duration;
use tracing::{debug, warn};

const AUTHORIZE_URL: &str = "https://api.backblazeb2.com/b2api/v2/b2_authorize_account";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful upload: the public URL the journal stores as
/// `error_message` on `status=completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub public_url: String,
}

/// What the Upload Worker needs from an object-store backend: authorize once
/// per sub-attempt, then push bytes to a named remote key.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn upload(&self, local_path: &str, remote_key: &str) -> Result<UploadedObject>;
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    #[serde(rename = "accountId")]
    account_id: String,
    #[serde(rename = "authorizationToken")]
    authorization_token: String,
    #[serde(rename = "apiUrl")]
    api_url: String,
    #[serde(rename = "downloadUrl")]
    download_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    #[serde(rename = "uploadUrl")]
    upload_url: String,
    #[serde(rename = "authorizationToken")]
    authorization_token: String,
}

#[derive(Debug, Deserialize)]
struct BucketInfo {
    #[serde(rename = "bucketId")]
    bucket_id: String,
    #[serde(rename = "bucketName")]
    bucket_name: String,
}

#[derive(Debug, Deserialize)]
struct ListBucketsResponse {
    buckets: Vec<BucketInfo>,
}

/// Real Backblaze B2 client: authorize → get an upload URL → PUT the file's
/// bytes as a single multipart-free upload (B2's native upload API, not S3's).
/// The public URL is composed from the fixed template
/// `https://<host>/file/<bucket>/<remote>` per SPEC_FULL.md §4.F step 3,
/// using the authorize call's `downloadUrl` host.
pub struct BackblazeB2Client {
    key_id: String,
    application_key: String,
    bucket_name: String,
    http: reqwest::Client,
}

impl BackblazeB2Client {
    pub fn new(config: &BackblazeConfig) -> Self {
        Self {
            key_id: config.key_id.clone(),
            application_key: config.application_key.clone(),
            bucket_name: config.bucket_name.clone(),
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    async fn authorize(&self) -> Result<AuthorizeResponse> {
        let resp = self
            .http
            .get(AUTHORIZE_URL)
            .basic_auth(&self.key_id, Some(&self.application_key))
            .send()
            .await
            .map_err(|e| PenareiaError::Upload(UploadError::AuthFailed { details: e.to_string() }))?;

        if !resp.status().is_success() {
            return Err(PenareiaError::Upload(UploadError::AuthFailed {
                details: format!("authorize_account returned {}", resp.status()),
            }));
        }

        resp.json::<AuthorizeResponse>()
            .await
            .map_err(|e| PenareiaError::Upload(UploadError::AuthFailed { details: e.to_string() }))
    }

    /// `b2_get_upload_url` takes the bucket's opaque ID, not its human-readable
    /// name, so this resolves the one the daemon is configured with via
    /// `b2_list_buckets` first.
    async fn resolve_bucket_id(&self, auth: &AuthorizeResponse) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/b2api/v2/b2_list_buckets", auth.api_url))
            .bearer_auth(&auth.authorization_token)
            .json(&serde_json::json!({
                "accountId": auth.account_id,
                "bucketName": self.bucket_name,
            }))
            .send()
            .await
            .map_err(|e| PenareiaError::Upload(UploadError::TransportFailed { details: e.to_string() }))?;

        if !resp.status().is_success() {
            return Err(PenareiaError::Upload(UploadError::TransportFailed {
                details: format!("b2_list_buckets returned {}", resp.status()),
            }));
        }

        let body = resp
            .json::<ListBucketsResponse>()
            .await
            .map_err(|e| PenareiaError::Upload(UploadError::TransportFailed { details: e.to_string() }))?;

        body.buckets
            .into_iter()
            .find(|b| b.bucket_name == self.bucket_name)
            .map(|b| b.bucket_id)
            .ok_or_else(|| {
                PenareiaError::Upload(UploadError::TransportFailed {
                    details: format!("no bucket named '{}' visible to this application key", self.bucket_name),
                })
            })
    }

    async fn get_upload_url(&self, auth: &AuthorizeResponse, bucket_id: &str) -> Result<UploadUrlResponse> {
        let resp = self
            .http
            .post(format!("{}/b2api/v2/b2_get_upload_url", auth.api_url))
            .bearer_auth(&auth.authorization_token)
            .json(&serde_json::json!({ "bucketId": bucket_id }))
            .send()
            .await
            .map_err(|e| PenareiaError::Upload(UploadError::TransportFailed { details: e.to_string() }))?;

        if !resp.status().is_success() {
            return Err(PenareiaError::Upload(UploadError::TransportFailed {
                details: format!("b2_get_upload_url returned {}", resp.status()),
            }));
        }

        resp.json::<UploadUrlResponse>()
            .await
            .map_err(|e| PenareiaError::Upload(UploadError::TransportFailed { details: e.to_string() }))
    }
}

#[async_trait]
impl ObjectStoreClient for BackblazeB2Client {
    async fn upload(&self, local_path: &str, remote_key: &str) -> Result<UploadedObject> {
        let auth = self.authorize().await?;
        let bucket_id = self.resolve_bucket_id(&auth).await?;
        let upload_target = self.get_upload_url(&auth, &bucket_id).await?;

        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| PenareiaError::Upload(UploadError::TransportFailed { details: e.to_string() }))?;
        let sha1 = {
            let mut hasher = Sha1::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        };

        debug!("Uploading {} ({} bytes) to B2 as {}", local_path, bytes.len(), remote_key);

        let resp = self
            .http
            .post(&upload_target.upload_url)
            .header("Authorization", &upload_target.authorization_token)
            .header("X-Bz-File-Name", remote_key)
            .header("Content-Type", "b2/x-auto")
            .header("X-Bz-Content-Sha1", sha1)
            .body(bytes)
            .send()
            .await
            .map_err(|e| PenareiaError::Upload(UploadError::TransportFailed { details: e.to_string() }))?;

        if !resp.status().is_success() {
            return Err(PenareiaError::Upload(UploadError::TransportFailed {
                details: format!("b2_upload_file returned {}", resp.status()),
            }));
        }

        let host = auth
            .download_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string();
        let public_url = format!("https://{}/file/{}/{}", host, self.bucket_name, remote_key);

        Ok(UploadedObject { public_url })
    }
}

/// Deterministic in-memory client used by tests: always succeeds, always
/// fails, or fails the first `fail_times` sub-attempts then succeeds.
pub struct MockObjectStoreClient {
    pub bucket: String,
    pub host: String,
    fail_times: std::sync::atomic::AtomicU32,
}

impl MockObjectStoreClient {
    pub fn always_succeeds() -> Self {
        Self {
            bucket: "test-bucket".to_string(),
            host: "test.example.com".to_string(),
            fail_times: std::sync::atomic::AtomicU32::new(0),
        }
    }

    pub fn always_fails() -> Self {
        Self {
            bucket: "test-bucket".to_string(),
            host: "test.example.com".to_string(),
            fail_times: std::sync::atomic::AtomicU32::new(u32::MAX),
        }
    }

    pub fn fails_n_times_then_succeeds(n: u32) -> Self {
        Self {
            bucket: "test-bucket".to_string(),
            host: "test.example.com".to_string(),
            fail_times: std::sync::atomic::AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl ObjectStoreClient for MockObjectStoreClient {
    async fn upload(&self, _local_path: &str, remote_key: &str) -> Result<UploadedObject> {
        use std::sync::atomic::Ordering;
        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
            }
            warn!("Mock object store upload failing ({} remaining)", remaining);
            return Err(PenareiaError::Upload(UploadError::TransportFailed {
                details: "mock transport failure".to_string(),
            }));
        }

        Ok(UploadedObject {
            public_url: format!("https://{}/file/{}/{}", self.host, self.bucket, remote_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_vector() {
        // SHA1("abc") per RFC 3174 test vector.
        let mut hasher = Sha1::new();
        hasher.update(b"abc");
        assert_eq!(format!("{:x}", hasher.finalize()), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[tokio::test]
    async fn test_mock_always_succeeds() {
        let client = MockObjectStoreClient::always_succeeds();
        let result = client.upload("/tmp/clip.mp4", "Penareia_x.mp4").await.unwrap();
        assert_eq!(result.public_url, "https://test.example.com/file/test-bucket/Penareia_x.mp4");
    }

    #[tokio::test]
    async fn test_mock_fails_n_times_then_succeeds() {
        let client = MockObjectStoreClient::fails_n_times_then_succeeds(2);
        assert!(client.upload("/tmp/clip.mp4", "x.mp4").await.is_err());
        assert!(client.upload("/tmp/clip.mp4", "x.mp4").await.is_err());
        assert!(client.upload("/tmp/clip.mp4", "x.mp4").await.is_ok());
    }
}
