//! Object-store capability consumed by the storage gateway.
//!
//! A backend stores flat keyed objects inside named buckets and offers
//! put/get/stat/delete. Each implementation maps its client library's errors
//! onto [`BackendError`] so nothing library-specific leaves this module.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

pub mod memory;
pub mod s3;

pub use memory::MemoryBackend;
pub use s3::{S3Backend, S3Settings};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("object not found")]
    NotFound,
    #[error("object already exists")]
    AlreadyExists,
    #[error("{0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Write semantics for [`ObjectBackend::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Last writer wins. Uploads never use it; it seeds objects written
    /// outside the upload pipeline.
    Overwrite,
    /// Fail with [`BackendError::AlreadyExists`] if the key is present.
    CreateOnly,
}

/// A single object write.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub mode: PutMode,
}

/// Backend-reported state of a stored object.
#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: Option<String>,
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Create `bucket` unless it already exists.
    async fn ensure_bucket(&self, bucket: &str) -> BackendResult<()>;

    /// Check that `bucket` is reachable.
    async fn ping(&self, bucket: &str) -> BackendResult<()>;

    async fn put(&self, bucket: &str, object: PutObject) -> BackendResult<()>;

    async fn get(&self, bucket: &str, key: &str) -> BackendResult<Bytes>;

    async fn stat(&self, bucket: &str, key: &str) -> BackendResult<ObjectStat>;

    async fn delete(&self, bucket: &str, key: &str) -> BackendResult<()>;
}
