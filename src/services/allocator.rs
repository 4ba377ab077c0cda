//! Human-readable, collision-free storage key allocation.
//!
//! Keys are the sanitized filename itself or, on collision, the filename with
//! a numeric disambiguator before the extension: `photo.png`, `photo-1.png`,
//! `photo-2.png`, ... The sequence is bounded so a pathological run of
//! collisions ends in `AllocationExhausted` instead of endless backend probes.

use crate::services::storage_service::{StorageError, StorageResult};
use std::future::Future;
use tracing::debug;

/// Default number of candidates tried before giving up.
pub const DEFAULT_MAX_KEY_ATTEMPTS: u32 = 100;

/// Bounded sequence of candidate keys for one sanitized filename.
#[derive(Debug, Clone)]
pub struct KeyCandidates {
    name: String,
    stem: String,
    suffix: String,
    next: u32,
    limit: u32,
}

impl KeyCandidates {
    /// `limit` counts every candidate, the undecorated name included.
    pub fn new(sanitized: &str, limit: u32) -> Self {
        let (stem, suffix) = split_extension(sanitized);
        Self {
            name: sanitized.to_string(),
            stem: stem.to_string(),
            suffix: suffix.to_string(),
            next: 0,
            limit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Iterator for KeyCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.next >= self.limit {
            return None;
        }
        let candidate = match self.next {
            0 => self.name.clone(),
            counter => format!("{}-{}{}", self.stem, counter, self.suffix),
        };
        self.next += 1;
        Some(candidate)
    }
}

/// Split at the last `.`; a leading dot does not start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Return the next candidate `exists` reports as free.
///
/// The iterator is left positioned after the returned key, so a caller that
/// loses a write race can call again and continue with the following number.
pub async fn allocate<F, Fut>(candidates: &mut KeyCandidates, mut exists: F) -> StorageResult<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = StorageResult<bool>>,
{
    for candidate in candidates.by_ref() {
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        debug!(key = %candidate, "storage key already taken");
    }

    Err(StorageError::AllocationExhausted {
        name: candidates.name().to_string(),
        attempts: candidates.limit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    fn taken(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn skips_taken_keys() {
        let used = taken(&["photo.png", "photo-1.png"]);
        let mut candidates = KeyCandidates::new("photo.png", DEFAULT_MAX_KEY_ATTEMPTS);
        let key = allocate(&mut candidates, |k| {
            let hit = used.contains(&k);
            async move { Ok(hit) }
        })
        .await
        .unwrap();
        assert_eq!(key, "photo-2.png");
    }

    #[tokio::test]
    async fn free_name_is_returned_unchanged() {
        let mut candidates = KeyCandidates::new("photo.png", DEFAULT_MAX_KEY_ATTEMPTS);
        let key = allocate(&mut candidates, |_| async { Ok(false) })
            .await
            .unwrap();
        assert_eq!(key, "photo.png");
    }

    #[tokio::test]
    async fn continues_after_a_lost_race() {
        let mut candidates = KeyCandidates::new("photo.png", DEFAULT_MAX_KEY_ATTEMPTS);
        let first = allocate(&mut candidates, |_| async { Ok(false) })
            .await
            .unwrap();
        let second = allocate(&mut candidates, |_| async { Ok(false) })
            .await
            .unwrap();
        assert_eq!(first, "photo.png");
        assert_eq!(second, "photo-1.png");
    }

    #[tokio::test]
    async fn gives_up_after_the_limit() {
        let mut candidates = KeyCandidates::new("busy.gif", 3);
        let mut probes = Vec::new();
        let result = allocate(&mut candidates, |k| {
            probes.push(k);
            async { Ok(true) }
        })
        .await;
        assert_matches!(
            result,
            Err(StorageError::AllocationExhausted { ref name, attempts: 3 }) if name == "busy.gif"
        );
        assert_eq!(probes, ["busy.gif", "busy-1.gif", "busy-2.gif"]);
    }

    #[tokio::test]
    async fn probe_errors_propagate() {
        let mut candidates = KeyCandidates::new("photo.png", DEFAULT_MAX_KEY_ATTEMPTS);
        let result = allocate(&mut candidates, |_| async {
            Err(StorageError::BackendUnavailable("connection refused".into()))
        })
        .await;
        assert_matches!(result, Err(StorageError::BackendUnavailable(_)));
    }

    #[test]
    fn disambiguator_goes_before_the_last_extension() {
        let names: Vec<_> = KeyCandidates::new("archive.tar.gz", 3).collect();
        assert_eq!(names, ["archive.tar.gz", "archive.tar-1.gz", "archive.tar-2.gz"]);

        let names: Vec<_> = KeyCandidates::new("README", 2).collect();
        assert_eq!(names, ["README", "README-1"]);
    }
}
