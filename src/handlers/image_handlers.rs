//! HTTP handlers for image upload, description and download.
//! Storage concerns are delegated to `ImageStorage`; upload additionally
//! leaves an `ImageRecord` behind in the relational store.

use crate::{
    AppState,
    errors::AppError,
    models::{image::ImageDescriptor, record::ImageRecord},
    services::{repository::Repository, storage_service::StorageError},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::io::Cursor;
use tracing::warn;
use uuid::Uuid;

/// Name of the multipart field carrying the image.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image: ImageDescriptor,
    /// Absent when the image was stored but the record could not be written.
    pub record_id: Option<Uuid>,
}

/// `GET /`: static service banner.
pub async fn index() -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /images`: multipart upload; the `file` field must carry a filename.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| AppError::bad_request("`file` field has no filename"))?;
        let data = field.bytes().await.map_err(multipart_error)?;
        let size = data.len() as u64;

        let key = state
            .storage
            .upload(&filename, Cursor::new(data), Some(size))
            .await?;
        let image = state.storage.describe(key.as_str()).await?;

        // The object is already stored; a failed record write does not undo it.
        let record = ImageRecord::from_upload(&filename, &image);
        let record_id = match state.records.create(&record).await {
            Ok(()) => Some(record.id),
            Err(err) => {
                warn!("failed to record upload of {}: {}", key, err);
                None
            }
        };

        return Ok((StatusCode::CREATED, Json(UploadResponse { image, record_id })));
    }

    Err(AppError::bad_request("multipart body has no `file` field"))
}

/// `GET /images/{key}`: descriptor JSON.
pub async fn describe_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ImageDescriptor>, AppError> {
    Ok(Json(state.storage.describe(&key).await?))
}

/// `HEAD /images/{key}`: 200 if stored, 404 otherwise.
pub async fn head_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.storage.exists(&key).await? {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// `DELETE /images/{key}`
pub async fn delete_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    state.storage.remove(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /media/{bucket}/{key}`: raw image bytes.
pub async fn download_image(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    if bucket != state.storage.bucket() {
        return Err(AppError::not_found(format!("bucket `{}` not found", bucket)));
    }

    let content_type = match state.storage.describe(&key).await {
        Ok(image) => image.content_type,
        Err(StorageError::InvalidMetadata { .. }) => "application/octet-stream".to_string(),
        Err(err) => return Err(err.into()),
    };
    let bytes = state.storage.download(&key).await?;
    let len = bytes.len();

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;
    set_media_headers(response.headers_mut(), &content_type, len);
    Ok(response)
}

fn set_media_headers(headers: &mut HeaderMap, content_type: &str, len: usize) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}
