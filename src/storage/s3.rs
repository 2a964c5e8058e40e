use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::core::config::StorageConfig;
use crate::core::error::StorageError;

use super::{virtual_hosted_url, MediaStore};

// ---------------------------------------------------------------------------
// S3MediaStore
// ---------------------------------------------------------------------------

/// Production storage backend wrapping `aws-sdk-s3`.
///
/// Supports both AWS S3 and S3-compatible stores (MinIO, DigitalOcean
/// Spaces, etc.) via configurable endpoint and path-style addressing.
pub struct S3MediaStore {
    client: Client,
    bucket: String,
    region: String,
    endpoint: String,
}

impl S3MediaStore {
    /// Create a new S3MediaStore from configuration.
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "clipvault-config",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.path_style);

        if !config.endpoint.is_empty() {
            s3_config_builder = s3_config_builder.endpoint_url(&config.endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::PutFailed {
                key: key.to_string(),
                reason: format!("cannot open local file: {}", e),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::PutFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        debug!(key, bucket = %self.bucket, "object stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        if self.endpoint.is_empty() {
            virtual_hosted_url(&self.bucket, &self.region, key)
        } else {
            // Path-style addressing for S3-compatible endpoints.
            format!("{}/{}/{}", self.endpoint, self.bucket, key)
        }
    }
}
