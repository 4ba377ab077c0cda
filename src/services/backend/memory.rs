//! In-process object backend for development and tests.

use super::{BackendError, BackendResult, ObjectBackend, ObjectStat, PutMode, PutObject};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: String,
    metadata: HashMap<String, String>,
    last_modified: DateTime<Utc>,
    etag: String,
}

type Buckets = HashMap<String, HashMap<String, StoredObject>>;

/// Buckets of objects kept in memory behind one lock.
///
/// Create-only puts check and insert under the same write guard, so two
/// racing writers of one key always see exactly one success.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    buckets: Arc<RwLock<Buckets>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with `bucket` already created.
    pub fn with_bucket(bucket: &str) -> Self {
        let buckets = Buckets::from([(bucket.to_string(), HashMap::new())]);
        Self {
            buckets: Arc::new(RwLock::new(buckets)),
        }
    }
}

fn no_such_bucket(bucket: &str) -> BackendError {
    BackendError::Unavailable(format!("bucket `{}` does not exist", bucket))
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn ensure_bucket(&self, bucket: &str) -> BackendResult<()> {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    async fn ping(&self, bucket: &str) -> BackendResult<()> {
        if self.buckets.read().await.contains_key(bucket) {
            Ok(())
        } else {
            Err(no_such_bucket(bucket))
        }
    }

    async fn put(&self, bucket: &str, object: PutObject) -> BackendResult<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;

        if object.mode == PutMode::CreateOnly && objects.contains_key(&object.key) {
            return Err(BackendError::AlreadyExists);
        }

        let etag = format!("{:x}", md5::compute(&object.body));
        debug!(bucket, key = %object.key, size = object.body.len(), "stored object in memory");
        objects.insert(
            object.key,
            StoredObject {
                body: object.body,
                content_type: object.content_type,
                metadata: object.metadata,
                last_modified: Utc::now(),
                etag,
            },
        );
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> BackendResult<Bytes> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        objects
            .get(key)
            .map(|object| object.body.clone())
            .ok_or(BackendError::NotFound)
    }

    async fn stat(&self, bucket: &str, key: &str) -> BackendResult<ObjectStat> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let object = objects.get(key).ok_or(BackendError::NotFound)?;
        Ok(ObjectStat {
            content_type: Some(object.content_type.clone()),
            metadata: object.metadata.clone(),
            size: object.body.len() as u64,
            last_modified: object.last_modified,
            etag: Some(object.etag.clone()),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> BackendResult<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        objects.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn object(key: &str, body: &'static [u8], mode: PutMode) -> PutObject {
        PutObject {
            key: key.to_string(),
            body: Bytes::from_static(body),
            content_type: "image/png".to_string(),
            metadata: HashMap::from([("width".to_string(), "1".to_string())]),
            mode,
        }
    }

    #[tokio::test]
    async fn put_then_stat_and_get() {
        let backend = MemoryBackend::with_bucket("images");
        backend
            .put("images", object("a.png", b"hello", PutMode::Overwrite))
            .await
            .unwrap();

        let stat = backend.stat("images", "a.png").await.unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(stat.content_type.as_deref(), Some("image/png"));
        assert_eq!(stat.metadata.get("width").map(String::as_str), Some("1"));
        assert_eq!(
            stat.etag.as_deref(),
            Some("5d41402abc4b2a76b9719d911017c592")
        );

        let body = backend.get("images", "a.png").await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn create_only_refuses_existing_keys() {
        let backend = MemoryBackend::with_bucket("images");
        backend
            .put("images", object("a.png", b"first", PutMode::CreateOnly))
            .await
            .unwrap();

        let second = backend
            .put("images", object("a.png", b"second", PutMode::CreateOnly))
            .await;
        assert_matches!(second, Err(BackendError::AlreadyExists));
        assert_eq!(&backend.get("images", "a.png").await.unwrap()[..], b"first");

        backend
            .put("images", object("a.png", b"third", PutMode::Overwrite))
            .await
            .unwrap();
        assert_eq!(&backend.get("images", "a.png").await.unwrap()[..], b"third");
    }

    #[tokio::test]
    async fn missing_objects_and_buckets_are_distinguished() {
        let backend = MemoryBackend::with_bucket("images");
        assert_matches!(
            backend.stat("images", "nope.png").await,
            Err(BackendError::NotFound)
        );
        assert_matches!(
            backend.get("other", "nope.png").await,
            Err(BackendError::Unavailable(_))
        );
        assert_matches!(backend.ping("other").await, Err(BackendError::Unavailable(_)));

        backend.ensure_bucket("other").await.unwrap();
        backend.ping("other").await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_the_object() {
        let backend = MemoryBackend::with_bucket("images");
        backend
            .put("images", object("a.png", b"x", PutMode::Overwrite))
            .await
            .unwrap();
        backend.delete("images", "a.png").await.unwrap();
        assert_matches!(
            backend.get("images", "a.png").await,
            Err(BackendError::NotFound)
        );
    }
}
