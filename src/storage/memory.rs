use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::error::StorageError;

use super::{virtual_hosted_url, MediaStore};

/// An object held by the in-memory backend.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory storage backend for development and tests.
///
/// Mirrors the production backend's URL scheme so tests can assert on the
/// exact public URL shape.
pub struct InMemoryMediaStore {
    bucket: String,
    region: String,
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl InMemoryMediaStore {
    pub fn new(bucket: &str, region: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            region: region.to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let data = tokio::fs::read(path).await?;
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        virtual_hosted_url(&self.bucket, &self.region, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_file_stores_bytes_and_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"payload").unwrap();

        let store = InMemoryMediaStore::new("clips", "us-east-1");
        store
            .put_file("landscape/abc.mp4", &path, "video/mp4")
            .await
            .unwrap();

        let obj = store.get("landscape/abc.mp4").unwrap();
        assert_eq!(obj.data, b"payload");
        assert_eq!(obj.content_type, "video/mp4");
        assert_eq!(
            store.public_url("landscape/abc.mp4"),
            "https://clips.s3.us-east-1.amazonaws.com/landscape/abc.mp4"
        );
    }

    #[tokio::test]
    async fn test_put_file_missing_local_file_errors() {
        let store = InMemoryMediaStore::new("clips", "us-east-1");
        let err = store
            .put_file("other/x.mp4", Path::new("/nonexistent/clip.mp4"), "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
