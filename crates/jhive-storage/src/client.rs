//! R2/S3 media storage client.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::keys::{MediaKind, StoredObject};

/// Configuration for the media storage client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL objects are served from
    pub public_base_url: String,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        fn require(name: &str) -> StorageResult<String> {
            std::env::var(name).map_err(|_| StorageError::config_error(format!("{} not set", name)))
        }

        Ok(Self {
            endpoint_url: require("R2_ENDPOINT_URL")?,
            access_key_id: require("R2_ACCESS_KEY_ID")?,
            secret_access_key: require("R2_SECRET_ACCESS_KEY")?,
            bucket_name: require("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: require("MEDIA_PUBLIC_BASE_URL")?,
        })
    }
}

/// Media storage client for uploaded avatars, resumes and logos.
#[derive(Clone)]
pub struct MediaStorage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

/// Build the S3 client for an R2-style endpoint (static credentials,
/// path-style addressing).
fn s3_client(config: &StorageConfig) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "r2",
    );

    Client::from_conf(
        Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build(),
    )
}

impl MediaStorage {
    /// Create a new client from configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            client: s3_client(&config),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(StorageConfig::from_env()?))
    }

    /// Public URL an object is served from.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Upload media bytes for an owner, returning the stored URL + key.
    ///
    /// Rejects content types the media kind does not accept.
    pub async fn upload(
        &self,
        kind: MediaKind,
        owner_id: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        if !kind.accepts(content_type) {
            return Err(StorageError::UnsupportedContentType(
                content_type.to_string(),
            ));
        }

        let key = kind.object_key(owner_id, content_type);
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {:?} object {}", kind, key);

        Ok(StoredObject {
            url: self.public_url(&key),
            key,
        })
    }

    /// Delete an object.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        debug!("Deleted object {}", key);
        Ok(())
    }

    /// Best-effort delete: failures are logged and swallowed so cleanup
    /// never blocks the primary response.
    pub async fn delete_best_effort(&self, key: &str) {
        if let Err(e) = self.delete(key).await {
            warn!("Best-effort delete of {} failed: {}", key, e);
        }
    }

    /// Connectivity check for readiness probes (bucket head).
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(e.to_string()))?;
        Ok(())
    }
}
