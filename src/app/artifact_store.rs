//! S3-backed storage for images and generated diagrams.
//!
//! Artifacts are keyed by generated object names so uploads never collide;
//! the chat frontend dereferences those keys (or full object URLs found in
//! agent replies) to fetch bytes for display.

use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use tracing::info;

/// Prefix for user-uploaded images.
const UPLOAD_PREFIX: &str = "uploaded_images";

/// A stored artifact: its object key and public-style URL.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub key: String,
    pub url: String,
}

/// Client for the artifact bucket.
pub struct ArtifactStore {
    client: s3::Client,
    bucket: String,
}

impl ArtifactStore {
    pub fn new(sdk_config: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self {
            client: s3::Client::new(sdk_config),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload image bytes under a generated object key and return the key
    /// plus its URL for embedding in an utterance.
    pub async fn put_image(&self, bytes: Vec<u8>, file_name: &str) -> Result<StoredArtifact> {
        let key = generate_object_key(file_name);
        let content_type = content_type_for(file_name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("Failed to upload {} to bucket {}", key, self.bucket))?;

        info!("Uploaded image to s3://{}/{}", self.bucket, key);
        let url = object_url(&self.bucket, &key);
        Ok(StoredArtifact { key, url })
    }

    /// Fetch artifact bytes from an arbitrary bucket/key pair. Replies may
    /// reference objects in buckets other than the configured one.
    pub async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch s3://{}/{}", bucket, key))?;

        let data = response
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of s3://{}/{}", bucket, key))?;
        Ok(data.into_bytes().to_vec())
    }
}

/// Generate a collision-free object key for an uploaded file.
pub fn generate_object_key(file_name: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let unique_id = uuid::Uuid::new_v4().simple().to_string();
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "{}/{}_{}_{}",
        UPLOAD_PREFIX,
        timestamp,
        &unique_id[..8],
        sanitized
    )
}

/// Content type inferred from the file extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "image/png"
    }
}

/// Virtual-hosted-style URL for an object.
pub fn object_url(bucket: &str, key: &str) -> String {
    format!("https://{}.s3.amazonaws.com/{}", bucket, key)
}

/// Parse a virtual-hosted-style S3 URL into (bucket, key). Returns `None`
/// for URLs that are not S3 object URLs.
pub fn parse_object_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("https://")?;
    let (host, key) = rest.split_once('/')?;
    let bucket = host.strip_suffix(".s3.amazonaws.com")?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket.to_string(), key.to_string()))
}
