//! services/api/src/adapters/blob_store.rs
//!
//! This module contains the adapter for blob storage. It implements the
//! `ObjectStoreService` port on top of the `object_store` crate, so the same code
//! writes to an S3-compatible bucket in production and to a local directory in
//! development.

use async_trait::async_trait;
use bytes::Bytes;
use document_insights_core::domain::{DocumentId, StoredObject};
use document_insights_core::ports::{ObjectStoreService, PortError, PortResult};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::StorageBackend;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ObjectStoreService` for any `object_store` backend.
#[derive(Clone)]
pub struct BlobStoreAdapter {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
    /// Whether the backend keeps a Content-Type attribute alongside the object.
    tag_content_type: bool,
}

impl BlobStoreAdapter {
    /// Creates a new `BlobStoreAdapter` around an already built store.
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into(),
            tag_content_type: false,
        }
    }

    /// Builds the adapter for the configured backend.
    pub fn from_config(backend: &StorageBackend, public_base_url: &str) -> PortResult<Self> {
        match backend {
            StorageBackend::S3 {
                bucket,
                region,
                endpoint,
            } => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_region(region.clone())
                    .with_bucket_name(bucket.clone());
                if let Some(endpoint) = endpoint {
                    builder = builder
                        .with_endpoint(endpoint.clone())
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                let store = builder.build().map_err(|e| {
                    PortError::Unexpected(format!("Invalid S3 configuration: {}", e))
                })?;
                Ok(Self {
                    tag_content_type: true,
                    ..Self::new(Arc::new(store), public_base_url)
                })
            }
            StorageBackend::Local { root } => {
                std::fs::create_dir_all(root).map_err(|e| {
                    PortError::Unexpected(format!(
                        "Cannot create storage directory {}: {}",
                        root.display(),
                        e
                    ))
                })?;
                let store = LocalFileSystem::new_with_prefix(root)
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
                Ok(Self::new(Arc::new(store), public_base_url))
            }
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}

//=========================================================================================
// `ObjectStoreService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ObjectStoreService for BlobStoreAdapter {
    async fn put(&self, bytes: Bytes, key: &str, mime_type: &str) -> PortResult<StoredObject> {
        let size_bytes = bytes.len() as u64;
        let location = Path::from(key);
        let start = Instant::now();

        let mut options = PutOptions::default();
        if self.tag_content_type {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, mime_type.to_string().into());
            options.attributes = attributes;
        }

        self.store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    key = %key,
                    size_bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Blob upload failed"
                );
                PortError::Unexpected(e.to_string())
            })?;

        info!(
            key = %key,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob upload successful"
        );

        Ok(StoredObject {
            id: DocumentId::new(key),
            name: key.to_string(),
            url: self.url_for(key),
            content_type: mime_type.to_string(),
            size_bytes,
        })
    }

    async fn resolve_url(&self, key: &str) -> PortResult<String> {
        Ok(self.url_for(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_backend_writes_the_file_and_builds_a_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StorageBackend::Local {
            root: dir.path().join("uploads"),
        };
        let adapter =
            BlobStoreAdapter::from_config(&backend, "https://files.example.com/").unwrap();

        let stored = adapter
            .put(Bytes::from_static(b"hello"), "abc-1.txt", "text/plain")
            .await
            .unwrap();

        assert_eq!(stored.id.as_str(), "abc-1.txt");
        assert_eq!(stored.url, "https://files.example.com/abc-1.txt");
        assert_eq!(stored.size_bytes, 5);
        let on_disk = std::fs::read(dir.path().join("uploads").join("abc-1.txt")).unwrap();
        assert_eq!(on_disk, b"hello");
    }

    #[tokio::test]
    async fn resolve_url_matches_the_url_returned_by_put() {
        let store = Arc::new(object_store::memory::InMemory::new());
        let adapter = BlobStoreAdapter::new(store, "http://localhost:4000/files");

        let stored = adapter
            .put(Bytes::from_static(b"%PDF"), "k.pdf", "application/pdf")
            .await
            .unwrap();

        assert_eq!(adapter.resolve_url("k.pdf").await.unwrap(), stored.url);
    }
}
