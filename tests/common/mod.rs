//! Shared fixtures for integration tests.
//!
//! Provides tiny, header-valid image payloads and a [`TestHarness`] wiring
//! the gateway to an in-memory object backend and an in-memory SQLite pool.

#![allow(dead_code)]

use axum::Router;
use image_store::{
    AppState, db,
    routes::routes::routes,
    services::{backend::MemoryBackend, storage_service::ImageStorage},
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

pub const BUCKET: &str = "images";

/// Baseline JFIF header followed by a SOF0 frame of the given size.
pub fn jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    bytes.extend_from_slice(b"JFIF\0");
    bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
    bytes.extend((0..200u8).map(|b| b.wrapping_mul(7)));
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

/// PNG signature plus an IHDR chunk of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[0x08, 0x06, 0x00, 0x00, 0x00]);
    bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    bytes
}

pub fn storage() -> (ImageStorage, MemoryBackend) {
    let backend = MemoryBackend::with_bucket(BUCKET);
    let storage = ImageStorage::new(Arc::new(backend.clone()), BUCKET);
    (storage, backend)
}

pub struct TestHarness {
    pub state: AppState,
    pub backend: MemoryBackend,
}

impl TestHarness {
    pub async fn new() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("failed to open in-memory sqlite");
        let pool = Arc::new(pool);
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let (storage, backend) = storage();
        Self {
            state: AppState::new(storage, pool),
            backend,
        }
    }

    pub fn router(&self) -> Router {
        routes().with_state(self.state.clone())
    }
}
