//! Avatar catalog: the eligible image files of one directory listing.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;

use crate::error::{Result, RotatorError};
use crate::types::{AvatarCandidate, EntryKind, FileEntry};

/// Extensions accepted as avatars, compared case-insensitively.
pub const AVATAR_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// True if `name` ends in one of [`AVATAR_EXTENSIONS`].
pub fn is_avatar_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AVATAR_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
        .unwrap_or(false)
}

/// Filter a listing down to avatar candidates.
///
/// Keeps files whose name carries an image extension, drops directories and
/// everything else. Output is sorted by name since remote listings are not
/// guaranteed to be stable; a repeated name keeps its first occurrence.
pub fn build_catalog(entries: &[FileEntry]) -> Vec<AvatarCandidate> {
    let mut by_name: BTreeMap<&str, AvatarCandidate> = BTreeMap::new();
    for entry in entries {
        if entry.kind != EntryKind::File || !is_avatar_name(&entry.name) {
            continue;
        }
        by_name
            .entry(entry.name.as_str())
            .or_insert_with(|| AvatarCandidate {
                name: entry.name.clone(),
                url: entry.download_url.clone(),
                size: entry.size,
            });
    }
    by_name.into_values().collect()
}

/// In-memory catalog snapshot for the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    candidates: Vec<AvatarCandidate>,
}

impl Catalog {
    pub fn from_listing(entries: &[FileEntry]) -> Self {
        Self {
            candidates: build_catalog(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[AvatarCandidate] {
        &self.candidates
    }

    pub fn find(&self, name: &str) -> Option<&AvatarCandidate> {
        self.candidates.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Uniform pick over all candidates.
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&AvatarCandidate> {
        if self.candidates.is_empty() {
            return Err(RotatorError::EmptyCatalog);
        }
        let idx = rng.gen_range(0..self.candidates.len());
        Ok(&self.candidates[idx])
    }
}
