pub mod key;
pub mod memory;
pub mod s3;

use std::path::Path;

use async_trait::async_trait;

use crate::core::error::StorageError;

// ---------------------------------------------------------------------------
// MediaStore trait
// ---------------------------------------------------------------------------

/// Trait-based abstraction over the object store backend.
///
/// The production implementation (`S3MediaStore`) wraps `aws-sdk-s3`;
/// `InMemoryMediaStore` backs development and tests without external deps.
/// Uploads are never retried here: large media PUTs are not safely
/// idempotent without a dedup scheme this service does not implement, so
/// retry policy belongs to the operator.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stream a local file's full contents to the store under `key`,
    /// setting `content_type` as object metadata.
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Deterministic public URL for a stored key, computed from the store's
    /// location and the key — never taken from a store response, so stored
    /// keys and served URLs cannot drift apart.
    fn public_url(&self, key: &str) -> String;
}

/// The AWS virtual-hosted URL form: `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
pub fn virtual_hosted_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}
