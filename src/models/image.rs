//! Image-facing values produced and consumed by the storage gateway.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::HashMap, fmt};

/// Object metadata key holding the pixel width.
pub const WIDTH_METADATA_KEY: &str = "width";
/// Object metadata key holding the pixel height.
pub const HEIGHT_METADATA_KEY: &str = "height";

/// Backend-unique name of a stored object.
///
/// Only the upload pipeline mints these, so every value is made of
/// `[A-Za-z0-9_.-]` and never starts or ends with `.` or `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub(crate) fn from_allocated(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Format and dimensions sniffed from an image header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// MIME type, e.g. `image/jpeg`.
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    pub fn metadata(&self) -> ImageMetadata {
        ImageMetadata {
            width: self.width,
            height: self.height,
        }
    }
}

/// The fixed user-metadata schema attached to every uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
}

impl ImageMetadata {
    /// Render into the string map the object backend stores verbatim.
    pub fn to_map(self) -> HashMap<String, String> {
        HashMap::from([
            (WIDTH_METADATA_KEY.to_string(), self.width.to_string()),
            (HEIGHT_METADATA_KEY.to_string(), self.height.to_string()),
        ])
    }

    /// Parse the backend's metadata map back into typed dimensions.
    ///
    /// On failure, returns the name of the first missing or malformed field.
    /// Keys are matched case-insensitively since S3 gateways differ in how
    /// they echo `x-amz-meta-*` headers.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, &'static str> {
        Ok(Self {
            width: parse_dimension(map, WIDTH_METADATA_KEY)?,
            height: parse_dimension(map, HEIGHT_METADATA_KEY)?,
        })
    }
}

fn parse_dimension(map: &HashMap<String, String>, field: &'static str) -> Result<u32, &'static str> {
    map.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(field))
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .ok_or(field)
}

/// Read-side view of a stored image, always derived from a fresh backend stat.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDescriptor {
    pub key: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    /// Public path, `/media/{bucket}/{key}`.
    pub url: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}
