//! Chunk naming and discovery
//!
//! Fragment `N` of a base name is stored under `<base>.<N>.chunk`, with `N`
//! starting at 1. Discovery checks keys for increasing `N` and stops at the
//! first gap, so only a contiguous run from 1 is ever seen.

use super::registry::Registry;
use super::types::{ChunkInfo, StoreError, CHUNK_SUFFIX};

// ============================================================================
// Naming
// ============================================================================

/// Registry key of fragment `index` of `base`
pub fn chunk_key(base: &str, index: u64) -> String {
    format!("{}.{}.{}", base, index, CHUNK_SUFFIX)
}

/// Split a fragment key back into base name and index.
///
/// Only canonical keys parse: a non-empty base, a positive index without
/// sign or leading zeros, and the `.chunk` suffix. Base names are taken
/// literally, so metacharacters in them need no escaping.
pub fn parse_chunk_key(key: &str) -> Option<(&str, u64)> {
    let stem = key.strip_suffix(CHUNK_SUFFIX)?.strip_suffix('.')?;
    let (base, digits) = stem.rsplit_once('.')?;

    if base.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with('0') {
        return None;
    }

    let index = digits.parse::<u64>().ok()?;
    Some((base, index))
}

/// Reject base names that are themselves fragment keys
pub fn validate_base_name(base: &str) -> Result<(), StoreError> {
    if parse_chunk_key(base).is_some() {
        return Err(StoreError::InvalidName(base.to_string()));
    }
    Ok(())
}

/// Reject index 0; fragment indices are 1-based
pub fn validate_chunk_index(index: u64) -> Result<(), StoreError> {
    if index == 0 {
        return Err(StoreError::InvalidChunkIndex(index));
    }
    Ok(())
}

// ============================================================================
// Discovery
// ============================================================================

/// A fragment found by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: u64,
    pub key: String,
    pub size: u64,
}

/// Find the contiguous fragments `1..=N` of `base`, ordered by index.
///
/// The scan stops at the first missing index or after `max_chunks` fragments.
/// An empty result is not an error here.
pub async fn discover_fragments(registry: &Registry, base: &str, max_chunks: u64) -> Vec<Fragment> {
    let mut fragments = Vec::new();

    for index in 1..=max_chunks {
        let key = chunk_key(base, index);
        let Some(object) = registry.get(&key).await else {
            break;
        };

        tracing::trace!(key = %key, size = object.size, "Found fragment");
        fragments.push(Fragment {
            index,
            key,
            size: object.size,
        });
    }

    if fragments.len() as u64 == max_chunks && registry.exists(&chunk_key(base, max_chunks + 1)).await {
        tracing::warn!(
            base = %base,
            max_chunks = max_chunks,
            "Fragment scan hit its bound, ignoring later fragments"
        );
    }

    fragments.sort_by_key(|fragment| fragment.index);
    fragments
}

/// Sum of fragment sizes
pub fn total_size(fragments: &[Fragment]) -> u64 {
    fragments.iter().map(|fragment| fragment.size).sum()
}

/// Logical chunk list for a base name.
///
/// A plain object under `base` is reported as a single chunk covering the
/// whole file, so the answer looks the same before and after assembly.
/// Otherwise the contiguous fragments are reported. `NotFound` when neither
/// exists.
pub async fn discover(
    registry: &Registry,
    base: &str,
    max_chunks: u64,
) -> Result<Vec<ChunkInfo>, StoreError> {
    if let Some(object) = registry.get(base).await {
        return Ok(vec![ChunkInfo::new(1, object.size)]);
    }

    let fragments = discover_fragments(registry, base, max_chunks).await;
    if fragments.is_empty() {
        return Err(StoreError::NotFound(base.to_string()));
    }

    Ok(fragments
        .into_iter()
        .map(|fragment| ChunkInfo::new(fragment.index, fragment.size))
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
