//! Image storage service: stable, human-readable keys for uploaded images,
//! header-sniffed dimensions, and an S3-compatible bucket behind a small
//! typed error vocabulary.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use state::AppState;
