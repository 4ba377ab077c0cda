//! Core data models for the image storage service.
//!
//! `image` holds the values the storage gateway hands out (keys, sniffed
//! info, descriptors); `record` holds the relational row kept per upload,
//! mapped to SQLite via `sqlx::FromRow` and serialized as JSON via `serde`.

pub mod image;
pub mod record;
