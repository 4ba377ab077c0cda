//! Relational record kept for every uploaded image.

use crate::{models::image::ImageDescriptor, services::repository::Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, query_builder::Separated};
use uuid::Uuid;

/// Row in the `images` table.
///
/// The object store stays the system of record for the bytes; this row only
/// remembers what the client originally called the file and what was sniffed.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct ImageRecord {
    /// Process-generated identifier.
    pub id: Uuid,

    /// Storage key the upload was assigned.
    pub key: String,

    /// Filename as sent by the client, before sanitizing.
    pub original_filename: String,

    pub content_type: String,
    pub width: i64,
    pub height: i64,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Build a fresh record for an image that was just uploaded.
    pub fn from_upload(original_filename: &str, image: &ImageDescriptor) -> Self {
        Self {
            id: Self::new_id(),
            key: image.key.clone(),
            original_filename: original_filename.to_string(),
            content_type: image.content_type.clone(),
            width: i64::from(image.width),
            height: i64::from(image.height),
            size_bytes: i64::try_from(image.size_bytes).unwrap_or(i64::MAX),
            created_at: image.created_at,
        }
    }
}

/// Partial update accepted by `PATCH /records/{id}`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ImageRecordChanges {
    pub original_filename: Option<String>,
    pub key: Option<String>,
}

impl Record for ImageRecord {
    type Changes = ImageRecordChanges;

    const TABLE: &'static str = "images";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "key",
        "original_filename",
        "content_type",
        "width",
        "height",
        "size_bytes",
        "created_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.key.clone())
            .push_bind(self.original_filename.clone())
            .push_bind(self.content_type.clone())
            .push_bind(self.width)
            .push_bind(self.height)
            .push_bind(self.size_bytes)
            .push_bind(self.created_at);
    }

    fn bind_changes<'args>(
        changes: Self::Changes,
        set: &mut Separated<'_, 'args, Sqlite, &'static str>,
    ) -> usize {
        let mut touched = 0;
        if let Some(original_filename) = changes.original_filename {
            set.push("original_filename = ")
                .push_bind_unseparated(original_filename);
            touched += 1;
        }
        if let Some(key) = changes.key {
            set.push("key = ").push_bind_unseparated(key);
            touched += 1;
        }
        touched
    }
}
