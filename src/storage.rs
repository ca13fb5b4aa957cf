//! Blob storage for raw and curated data (S3, R2, GCS, Azure, local)

use crate::error::{Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use tracing::debug;

/// Storage location parsed from a URL
///
/// Wraps an [`ObjectStore`] together with the bucket name and key prefix the
/// URL pointed at. Keys passed to the methods below are relative to that
/// prefix.
#[derive(Debug, Clone)]
pub struct Storage {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Bucket, container or local root directory
    bucket: String,
    /// Base path prefix within the bucket/container
    prefix: String,
    /// URL scheme (s3, r2, gs, az, file, memory)
    scheme: String,
}

impl Storage {
    /// Parse a storage URL and create the matching object store
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `memory://name/path/` - process-local store, for dry runs
    /// - `/local/path/` or `file:///path/` - Local filesystem
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("s3://") {
            Self::parse_s3(rest, false)
        } else if let Some(rest) = url.strip_prefix("r2://") {
            Self::parse_s3(rest, true)
        } else if let Some(rest) = url.strip_prefix("gs://") {
            Self::parse_gcs(rest)
        } else if let Some(rest) = url.strip_prefix("az://") {
            Self::parse_azure(rest)
        } else if let Some(rest) = url.strip_prefix("memory://") {
            let (bucket, prefix) = split_bucket(rest);
            Ok(Self::from_store(Arc::new(InMemory::new()), bucket, prefix, "memory"))
        } else {
            Self::parse_local(url)
        }
    }

    /// Wrap an existing object store
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        scheme: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            scheme: scheme.into(),
        }
    }

    /// Create an empty in-memory store
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::from_store(Arc::new(InMemory::new()), bucket, "", "memory")
    }

    /// Parse S3 or R2 URL (without scheme)
    fn parse_s3(without_scheme: &str, is_r2: bool) -> Result<Self> {
        let scheme = if is_r2 { "r2" } else { "s3" };
        let (bucket, prefix) = split_bucket(without_scheme);

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        // AWS_ENDPOINT is read by from_env(); R2 also honours its own variable
        if is_r2 {
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;

        Ok(Self::from_store(Arc::new(store), bucket, prefix, scheme))
    }

    /// Parse GCS URL (without scheme)
    fn parse_gcs(without_scheme: &str) -> Result<Self> {
        let (bucket, prefix) = split_bucket(without_scheme);

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self::from_store(Arc::new(store), bucket, prefix, "gs"))
    }

    /// Parse Azure Blob URL (without scheme)
    fn parse_azure(without_scheme: &str) -> Result<Self> {
        let (container, prefix) = split_bucket(without_scheme);

        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Ok(Self::from_store(Arc::new(store), container, prefix, "az"))
    }

    /// Parse local filesystem path
    fn parse_local(path: &str) -> Result<Self> {
        let path = path.strip_prefix("file://").unwrap_or(path);

        std::fs::create_dir_all(path)
            .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;

        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self::from_store(Arc::new(store), path, "", "file"))
    }

    /// Check if this is a cloud location (not local or in-memory)
    pub fn is_cloud(&self) -> bool {
        !matches!(self.scheme.as_str(), "file" | "memory")
    }

    /// Get the scheme (s3, r2, gs, az, file, memory)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Bucket, container or local root directory
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key prefix inside the bucket
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Underlying object store
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Resolve a key relative to the prefix into an object path
    fn object_path(&self, key: &str) -> Result<ObjectPath> {
        let key = key.trim_matches('/');
        let full = match (self.prefix.is_empty(), key.is_empty()) {
            (true, _) => key.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{key}", self.prefix),
        };
        ObjectPath::parse(&full).map_err(|e| Error::storage(format!("Invalid key '{full}': {e}")))
    }

    /// Strip the prefix from a listed location
    fn relative_key(&self, location: &ObjectPath) -> String {
        let full = location.as_ref();
        if self.prefix.is_empty() {
            return full.to_string();
        }
        full.strip_prefix(&self.prefix)
            .map_or(full, |rest| rest.trim_start_matches('/'))
            .to_string()
    }

    /// Write bytes under `key`, returning the key within the bucket
    ///
    /// The content type is recorded as object metadata on stores that keep
    /// attributes; the local filesystem store does not, so it is omitted
    /// there.
    pub async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> Result<String> {
        let path = self.object_path(key)?;

        let mut opts = PutOptions::default();
        if let Some(content_type) = content_type {
            if self.scheme != "file" {
                let mut attributes = Attributes::new();
                attributes.insert(Attribute::ContentType, content_type.to_string().into());
                opts.attributes = attributes;
            }
        }

        self.store
            .put_opts(&path, PutPayload::from(data), opts)
            .await
            .map_err(|e| Error::storage(format!("Failed to write {path}: {e}")))?;

        debug!("Wrote {}://{}/{}", self.scheme, self.bucket, path);
        Ok(path.to_string())
    }

    /// Read the full contents of `key`
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.object_path(key)?;
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => Error::ObjectNotFound {
                path: path.to_string(),
            },
            other => Error::storage(format!("Failed to read {path}: {other}")),
        })?;
        result
            .bytes()
            .await
            .map_err(|e| Error::storage(format!("Failed to read {path}: {e}")))
    }

    /// List every key under `prefix`, sorted
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = self.object_path(prefix)?;
        let list_root = if path.as_ref().is_empty() {
            None
        } else {
            Some(&path)
        };

        let metas: Vec<_> = self
            .store
            .list(list_root)
            .try_collect()
            .await
            .map_err(|e| Error::storage(format!("Failed to list {path}: {e}")))?;

        let mut keys: Vec<String> = metas
            .iter()
            .map(|meta| self.relative_key(&meta.location))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Delete the object at `key`
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        self.store
            .delete(&path)
            .await
            .map_err(|e| Error::storage(format!("Failed to delete {path}: {e}")))
    }
}

/// Split `bucket/some/prefix` into its bucket and prefix
fn split_bucket(without_scheme: &str) -> (&str, String) {
    match without_scheme.find('/') {
        Some(idx) => (
            &without_scheme[..idx],
            without_scheme[idx + 1..].trim_matches('/').to_string(),
        ),
        None => (without_scheme, String::new()),
    }
}
