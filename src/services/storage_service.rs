//! src/services/storage_service.rs
//!
//! ImageStorage, the image gateway in front of an S3-compatible bucket.
//! It turns client filenames into unique storage keys, sniffs dimensions
//! from the bytes, and writes the object with that metadata attached. Reads
//! always go back to the backend; nothing is cached here.

use crate::{
    models::image::{ImageDescriptor, ImageMetadata, StorageKey},
    services::{
        allocator::{DEFAULT_MAX_KEY_ATTEMPTS, KeyCandidates, allocate},
        backend::{BackendError, ObjectBackend, PutMode, PutObject},
        sanitize::sanitize,
        sniff::sniff,
    },
};
use bytes::Bytes;
use std::{
    io::{self, ErrorKind, SeekFrom},
    sync::Arc,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("stream is not a recognized image format")]
    UnrecognizedFormat,
    #[error("object store unavailable: {0}")]
    BackendUnavailable(String),
    #[error("no free storage key for `{name}` after {attempts} attempts")]
    AllocationExhausted { name: String, attempts: u32 },
    #[error("filename `{0}` has no usable characters")]
    InvalidFilename(String),
    #[error("object `{key}` has missing or invalid `{field}` metadata")]
    InvalidMetadata { key: String, field: &'static str },
    #[error(transparent)]
    Stream(#[from] io::Error),
}

impl StorageError {
    /// Translate a backend failure observed while working on `key`.
    fn from_backend(err: BackendError, key: &str) -> Self {
        match err {
            BackendError::NotFound => StorageError::NotFound(key.to_string()),
            BackendError::AlreadyExists => StorageError::BackendUnavailable(format!(
                "unexpected write conflict on `{}`",
                key
            )),
            BackendError::Unavailable(reason) => StorageError::BackendUnavailable(reason),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// ImageStorage provides the image operations the rest of the service uses:
/// - exists / describe (backend stat)
/// - upload (sanitize, sniff, allocate a key, create-only put)
/// - download / remove
///
/// The handle is cheap to clone; every clone shares the same backend client
/// and bucket.
#[derive(Clone)]
pub struct ImageStorage {
    backend: Arc<dyn ObjectBackend>,
    bucket: String,
    max_key_attempts: u32,
}

impl ImageStorage {
    pub fn new(backend: Arc<dyn ObjectBackend>, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            max_key_attempts: DEFAULT_MAX_KEY_ATTEMPTS,
        }
    }

    /// Cap the number of keys tried per upload. Values below 1 are raised to 1.
    pub fn with_max_key_attempts(mut self, attempts: u32) -> Self {
        self.max_key_attempts = attempts.max(1);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public path an object is served under.
    pub fn public_url(&self, key: &str) -> String {
        format!("/media/{}/{}", self.bucket, key)
    }

    /// Create the configured bucket if it is missing.
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        self.backend
            .ensure_bucket(&self.bucket)
            .await
            .map_err(|err| StorageError::from_backend(err, &self.bucket))
    }

    /// Check the bucket is reachable.
    pub async fn ping(&self) -> StorageResult<()> {
        self.backend
            .ping(&self.bucket)
            .await
            .map_err(|err| StorageError::from_backend(err, &self.bucket))
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.backend.stat(&self.bucket, key).await {
            Ok(_) => Ok(true),
            Err(BackendError::NotFound) => Ok(false),
            Err(err) => Err(StorageError::from_backend(err, key)),
        }
    }

    /// Store an image under a fresh key derived from `filename`.
    ///
    /// `size_hint` is the number of bytes to store; when it is absent or zero
    /// the stream length is measured by seeking. The same filename uploaded twice gets
    /// two keys. Writes are create-only: if another upload claims the chosen
    /// key between the existence probe and the write, allocation continues
    /// with the next candidate instead of overwriting.
    pub async fn upload<R>(
        &self,
        filename: &str,
        mut stream: R,
        size_hint: Option<u64>,
    ) -> StorageResult<StorageKey>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let sanitized = sanitize(filename);
        if sanitized.is_empty() {
            return Err(StorageError::InvalidFilename(filename.to_string()));
        }

        let info = sniff(&mut stream).await?;
        let size = match size_hint {
            Some(size) if size > 0 => size,
            _ => stream_len(&mut stream).await?,
        };
        let body = read_exact_len(&mut stream, size).await?;
        let metadata = info.metadata().to_map();

        let mut candidates = KeyCandidates::new(&sanitized, self.max_key_attempts);
        loop {
            let key = allocate(&mut candidates, |candidate| async move {
                self.exists(&candidate).await
            })
            .await?;

            let object = PutObject {
                key: key.clone(),
                body: body.clone(),
                content_type: info.content_type.clone(),
                metadata: metadata.clone(),
                mode: PutMode::CreateOnly,
            };
            match self.backend.put(&self.bucket, object).await {
                Ok(()) => {
                    info!(
                        key = %key,
                        filename,
                        content_type = %info.content_type,
                        width = info.width,
                        height = info.height,
                        size,
                        "uploaded image"
                    );
                    return Ok(StorageKey::from_allocated(key));
                }
                Err(BackendError::AlreadyExists) => {
                    warn!(key = %key, "storage key claimed by a concurrent upload, trying next");
                }
                Err(err) => return Err(StorageError::from_backend(err, &key)),
            }
        }
    }

    pub async fn download(&self, key: &str) -> StorageResult<Bytes> {
        let body = self
            .backend
            .get(&self.bucket, key)
            .await
            .map_err(|err| StorageError::from_backend(err, key))?;
        debug!(key, size = body.len(), "downloaded image");
        Ok(body)
    }

    /// Describe a stored image from a fresh backend stat.
    pub async fn describe(&self, key: &str) -> StorageResult<ImageDescriptor> {
        let stat = self
            .backend
            .stat(&self.bucket, key)
            .await
            .map_err(|err| StorageError::from_backend(err, key))?;

        let dimensions =
            ImageMetadata::from_map(&stat.metadata).map_err(|field| StorageError::InvalidMetadata {
                key: key.to_string(),
                field,
            })?;
        let content_type = stat
            .content_type
            .ok_or_else(|| StorageError::InvalidMetadata {
                key: key.to_string(),
                field: "content-type",
            })?;

        Ok(ImageDescriptor {
            key: key.to_string(),
            content_type,
            width: dimensions.width,
            height: dimensions.height,
            url: self.public_url(key),
            size_bytes: stat.size,
            created_at: stat.last_modified,
        })
    }

    /// Delete a stored image. Fails with `NotFound` if the key is absent.
    pub async fn remove(&self, key: &str) -> StorageResult<()> {
        if !self.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.backend
            .delete(&self.bucket, key)
            .await
            .map_err(|err| StorageError::from_backend(err, key))?;
        info!(key, "removed image");
        Ok(())
    }
}

/// Measure a stream by seeking to its end, then rewind it.
async fn stream_len<R>(stream: &mut R) -> io::Result<u64>
where
    R: AsyncSeek + Unpin,
{
    let end = stream.seek(SeekFrom::End(0)).await?;
    stream.seek(SeekFrom::Start(0)).await?;
    Ok(end)
}

/// Read exactly `size` bytes from the current position.
async fn read_exact_len<R>(stream: &mut R, size: u64) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    (&mut *stream).take(size).read_to_end(&mut body).await?;
    if (body.len() as u64) < size {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("stream ended after {} of {} bytes", body.len(), size),
        ));
    }
    Ok(Bytes::from(body))
}
