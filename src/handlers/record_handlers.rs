//! Passthrough handlers for the image record repository.

use crate::{
    AppState,
    errors::AppError,
    models::record::{ImageRecord, ImageRecordChanges},
    services::repository::Repository,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// `GET /records`
pub async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageRecord>>, AppError> {
    Ok(Json(state.records.get_all().await?))
}

/// `GET /records/{id}`
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ImageRecord>, AppError> {
    state
        .records
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| record_not_found(id))
}

/// `PATCH /records/{id}`: returns the updated record.
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<ImageRecordChanges>,
) -> Result<Json<ImageRecord>, AppError> {
    if !state.records.update(id, changes).await? {
        return Err(record_not_found(id));
    }
    get_record(State(state), Path(id)).await
}

/// `DELETE /records/{id}`
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.records.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(record_not_found(id))
    }
}

fn record_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("record `{}` not found", id))
}
