//! Defines routes for the image API.
//!
//! ## Structure
//! - **Images**
//!   - `POST   /images`            multipart upload (`file` field)
//!   - `GET    /images/{key}`      descriptor JSON
//!   - `HEAD   /images/{key}`      existence check
//!   - `DELETE /images/{key}`      remove the object
//!   - `GET    /media/{bucket}/{key}`   raw bytes (the descriptor's `url`)
//!
//! - **Records**
//!   - `GET    /records`, `GET|PATCH|DELETE /records/{id}`
//!
//! - **Probes**: `/healthz`, `/readyz`; `GET /` returns a service banner.

use crate::{
    AppState,
    handlers::{
        health_handlers::{healthz, readyz},
        image_handlers::{
            delete_image, describe_image, download_image, head_image, index, upload_image,
        },
        record_handlers::{delete_record, get_record, list_records, update_record},
    },
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Largest request body accepted, multipart framing included.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Build and return the router for the whole API.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Image routes
        .route("/images", post(upload_image))
        .route(
            "/images/{key}",
            get(describe_image).head(head_image).delete(delete_image),
        )
        .route("/media/{bucket}/{key}", get(download_image))
        // Record routes
        .route("/records", get(list_records))
        .route(
            "/records/{id}",
            get(get_record).patch(update_record).delete(delete_record),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
