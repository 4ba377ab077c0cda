use crate::{
    models::record::ImageRecord,
    services::{repository::SqliteRepository, storage_service::ImageStorage},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: ImageStorage,
    pub records: SqliteRepository<ImageRecord>,
    pub db: Arc<SqlitePool>,
}

impl AppState {
    pub fn new(storage: ImageStorage, db: Arc<SqlitePool>) -> Self {
        Self {
            storage,
            records: SqliteRepository::new(db.clone()),
            db,
        }
    }
}
