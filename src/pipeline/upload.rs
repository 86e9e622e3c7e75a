//! Object storage: persist the encoded thumbnail and compute its public URL.
//!
//! The uploader wraps an [`ObjectStore`] trait object. In production that is
//! an [`AmazonS3`](object_store::aws::AmazonS3) client pointed at an
//! S3-compatible endpoint (Cloudflare R2 by default); tests and dry runs use
//! [`InMemory`]. The client is built once and shared by every pipeline run:
//! `ObjectStore` implementations are `Send + Sync` and pool their own
//! connections.

use crate::config::StorageConfig;
use crate::error::PdfThumbError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::fetch::error_chain;
use crate::pipeline::key::StorageKey;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Writes thumbnails to one bucket of an object store.
#[derive(Debug, Clone)]
pub struct ObjectStorageUploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    public_base_url: String,
    timeout_secs: u64,
}

impl ObjectStorageUploader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
            timeout_secs: timeout_secs.max(1),
        }
    }

    /// Build an S3 client for `config.bucket`.
    ///
    /// Requires credentials and either an explicit endpoint or an account id.
    pub fn s3(config: &StorageConfig) -> Result<Self, PdfThumbError> {
        let endpoint = config.resolved_endpoint().ok_or_else(|| {
            PdfThumbError::InvalidConfig(
                "storage endpoint unknown: set an account id or an explicit endpoint".into(),
            )
        })?;
        if config.access_key_id.trim().is_empty() || config.secret_access_key.trim().is_empty() {
            return Err(PdfThumbError::InvalidConfig(
                "storage access key id and secret access key are required".into(),
            ));
        }

        let store = AmazonS3Builder::new()
            .with_allow_http(endpoint.starts_with("http://"))
            .with_endpoint(endpoint.clone())
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone())
            .with_access_key_id(config.access_key_id.clone())
            .with_secret_access_key(config.secret_access_key.clone())
            .build()
            .map_err(|e| PdfThumbError::InvalidConfig(format!("S3 client: {e}")))?;

        info!(
            "Object storage: bucket '{}' at {}",
            config.bucket, endpoint
        );

        Ok(Self::new(
            Arc::new(store),
            config.bucket.clone(),
            config.public_base_url.clone(),
            config.upload_timeout_secs,
        ))
    }

    /// Uploader backed by a process-local in-memory store.
    pub fn in_memory(bucket: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), bucket, public_base_url, 60)
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Put `image` at `key`, overwriting any existing object.
    ///
    /// On timeout the request future is dropped, but the store may still
    /// apply the write. An `UploadTimeout` therefore does not guarantee the
    /// previous object at `key` is unchanged.
    pub async fn put(&self, key: &StorageKey, image: &EncodedImage) -> Result<(), PdfThumbError> {
        if key.bucket() != self.bucket {
            return Err(PdfThumbError::BucketMismatch {
                requested: key.bucket().to_string(),
                configured: self.bucket.clone(),
            });
        }

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, image.content_type.into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        info!("Uploading thumbnail: {}/{}", self.bucket, key.path());
        let put = self
            .store
            .put_opts(key.location(), PutPayload::from(image.bytes.clone()), opts);

        match tokio::time::timeout(Duration::from_secs(self.timeout_secs), put).await {
            Ok(Ok(result)) => {
                debug!(
                    "Stored {} bytes at {} (etag: {:?})",
                    image.len(),
                    key.path(),
                    result.e_tag
                );
                Ok(())
            }
            Ok(Err(e)) => Err(PdfThumbError::UploadFailed {
                key: key.path().to_string(),
                reason: error_chain(&e),
            }),
            Err(_elapsed) => Err(PdfThumbError::UploadTimeout {
                key: key.path().to_string(),
                secs: self.timeout_secs,
            }),
        }
    }

    /// Public URL of `key`; valid only for publicly readable buckets.
    pub fn public_url(&self, key: &StorageKey) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            key.path()
        )
    }
}
