use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Reference to a stored upload, returned to the client and persisted on
/// the submission row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub url: String,
    pub name: String,
    pub size: i64,
}

/// Object storage seam. The S3 client is the production implementation;
/// tests use the in-memory store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `body` under `key` and returns the object's canonical URL.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, AppError>;

    /// Returns a time-limited URL for a private read of `key`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, AppError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

        Ok(format!("s3://{}/{}", self.bucket, key))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, AppError> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::Storage(format!("Invalid presign expiry: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| AppError::Storage(format!("S3 presign failed: {e}")))?;

        Ok(presigned.uri().to_string())
    }
}

/// Extracts the bucket-relative object key from a canonical storage URL
/// ("s3://bucket/key" or "mem://key").
pub fn object_key(url: &str) -> &str {
    match url.split_once("://") {
        Some(("mem", rest)) => rest,
        Some((_, rest)) => rest.split_once('/').map(|(_, key)| key).unwrap_or(rest),
        None => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_from_s3_url() {
        assert_eq!(
            object_key("s3://uploads/submissions/a/b/essay.pdf"),
            "submissions/a/b/essay.pdf"
        );
    }

    #[test]
    fn test_object_key_from_memory_url() {
        assert_eq!(object_key("mem://submissions/a/b/essay.pdf"), "submissions/a/b/essay.pdf");
    }

    #[test]
    fn test_object_key_passthrough() {
        assert_eq!(object_key("submissions/a/b/essay.pdf"), "submissions/a/b/essay.pdf");
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory store for tests. Records every put so tests can assert
    /// that a rejected file never reached storage.
    #[derive(Default)]
    pub struct MemoryObjectStore {
        pub objects: Mutex<HashMap<String, Bytes>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn put(
            &self,
            key: &str,
            body: Bytes,
            _content_type: &str,
        ) -> Result<String, AppError> {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), body);
            Ok(format!("mem://{key}"))
        }

        async fn presign_get(
            &self,
            key: &str,
            _expires_in: Duration,
        ) -> Result<String, AppError> {
            Ok(format!("mem://{key}?signed"))
        }
    }
}
