//! S3-compatible object backend (AWS S3, MinIO, ...).

use super::{BackendError, BackendResult, ObjectBackend, ObjectStat, PutMode, PutObject};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::debug;

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone)]
pub struct S3Settings {
    /// `host:port` or a full URL.
    pub endpoint: String,
    /// Use https when `endpoint` carries no scheme.
    pub secure: bool,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub session_token: Option<String>,
}

impl S3Settings {
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            let scheme = if self.secure { "https" } else { "http" };
            format!("{}://{}", scheme, self.endpoint)
        }
    }
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("secure", &self.secure)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    region: String,
}

impl S3Backend {
    /// Build a client for `settings`.
    ///
    /// Static credentials are used when both keys are set; otherwise the
    /// default AWS provider chain applies. Path-style addressing is forced,
    /// which is what MinIO and most self-hosted gateways expect.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                settings.session_token.clone(),
                None,
                "image-store",
            ));
        }

        let shared = loader.load().await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .endpoint_url(settings.endpoint_url())
            .force_path_style(true)
            .build();

        debug!(endpoint = %settings.endpoint_url(), region = %settings.region, "initialized S3 client");

        Self {
            client: Client::from_conf(config),
            region: settings.region.clone(),
        }
    }
}

fn unavailable<E: std::error::Error>(operation: &str, err: E) -> BackendError {
    BackendError::Unavailable(format!("S3 {} failed: {}", operation, DisplayErrorContext(err)))
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn ensure_bucket(&self, bucket: &str) -> BackendResult<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => return Ok(()),
            Err(SdkError::ServiceError(ref service)) if service.err().is_not_found() => {}
            Err(err) => return Err(unavailable("HeadBucket", err)),
        }

        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                tracing::info!("Created bucket {}", bucket);
                Ok(())
            }
            Err(SdkError::ServiceError(ref service))
                if service.err().is_bucket_already_owned_by_you() =>
            {
                Ok(())
            }
            Err(err) => Err(unavailable("CreateBucket", err)),
        }
    }

    async fn ping(&self, bucket: &str) -> BackendResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| unavailable("HeadBucket", err))
    }

    async fn put(&self, bucket: &str, object: PutObject) -> BackendResult<()> {
        let size = object.body.len();
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(&object.key)
            .content_type(object.content_type)
            .content_length(size as i64)
            .body(ByteStream::from(object.body));
        for (name, value) in object.metadata {
            request = request.metadata(name, value);
        }
        if object.mode == PutMode::CreateOnly {
            request = request.if_none_match("*");
        }

        request.send().await.map_err(|err| match err {
            SdkError::ServiceError(ref service)
                if matches!(
                    service.err().code(),
                    Some("PreconditionFailed" | "ConditionalRequestConflict")
                ) =>
            {
                BackendError::AlreadyExists
            }
            other => unavailable("PutObject", other),
        })?;

        debug!(bucket, key = %object.key, size, "uploaded object to S3");
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> BackendResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(ref service) if service.err().is_no_such_key() => {
                    BackendError::NotFound
                }
                other => unavailable("GetObject", other),
            })?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| unavailable("GetObject body", err))?;
        Ok(body.into_bytes())
    }

    async fn stat(&self, bucket: &str, key: &str) -> BackendResult<ObjectStat> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(ref service) if service.err().is_not_found() => {
                    BackendError::NotFound
                }
                other => unavailable("HeadObject", other),
            })?;

        Ok(ObjectStat {
            content_type: output.content_type().map(str::to_string),
            metadata: output.metadata().cloned().unwrap_or_default(),
            size: output
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or(0),
            last_modified: output
                .last_modified()
                .and_then(to_chrono)
                .unwrap_or_default(),
            etag: output.e_tag().map(|tag| tag.trim_matches('"').to_string()),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> BackendResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| unavailable("DeleteObject", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str, secure: bool) -> S3Settings {
        S3Settings {
            endpoint: endpoint.to_string(),
            secure,
            region: "us-east-1".to_string(),
            access_key: Some("minio".to_string()),
            secret_key: Some("minio-secret".to_string()),
            session_token: None,
        }
    }

    #[test]
    fn endpoint_gets_a_scheme_from_the_secure_flag() {
        assert_eq!(
            settings("localhost:9000", false).endpoint_url(),
            "http://localhost:9000"
        );
        assert_eq!(
            settings("s3.example.com", true).endpoint_url(),
            "https://s3.example.com"
        );
        assert_eq!(
            settings("https://minio.internal:9000", false).endpoint_url(),
            "https://minio.internal:9000"
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", settings("localhost:9000", false));
        assert!(rendered.contains("minio"));
        assert!(!rendered.contains("minio-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
