//! Chunk Assembler
//!
//! Merges the fragments of a base name into one object once the caller's
//! declared total matches the sum of fragment sizes, and reports per-chunk
//! metadata for progress queries.
//!
//! Assembly is not atomic. Each fragment is removed right after its bytes are
//! appended, and a failure part way through leaves the already consumed
//! fragments gone with nothing written under the base name. Callers must
//! serialize assembly of the same base name themselves.

use std::sync::Arc;

use super::chunks::{discover, discover_fragments, total_size, validate_base_name};
use super::registry::Registry;
use super::types::{ChunkInfo, StoreError, StoredObject};

// ============================================================================
// Assembler
// ============================================================================

/// Fragment assembler bound to a registry
#[derive(Clone)]
pub struct Assembler {
    registry: Registry,

    /// Upper bound on the fragment scan
    max_chunks: u64,
}

impl Assembler {
    pub fn new(registry: Registry, max_chunks: u64) -> Self {
        Self {
            registry,
            max_chunks,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Assemble `base` from its fragments.
    ///
    /// Fails with `SizeMismatch` without touching anything when
    /// `requested_total` differs from the fragment sum. With no fragments
    /// left, an existing object of exactly `requested_total` bytes counts as
    /// already assembled; anything else is `NotFound`.
    pub async fn assemble(
        &self,
        base: &str,
        requested_total: u64,
    ) -> Result<Arc<StoredObject>, StoreError> {
        validate_base_name(base)?;

        tracing::debug!(base = %base, requested_total = requested_total, "Assembling");

        let fragments = discover_fragments(&self.registry, base, self.max_chunks).await;

        if fragments.is_empty() {
            return match self.registry.get(base).await {
                Some(object) if object.size == requested_total => {
                    tracing::debug!(base = %base, size = object.size, "Already assembled");
                    Ok(object)
                }
                _ => {
                    tracing::debug!(base = %base, "No fragments to assemble");
                    Err(StoreError::NotFound(base.to_string()))
                }
            };
        }

        let computed = total_size(&fragments);
        if computed != requested_total {
            tracing::error!(
                base = %base,
                requested_total = requested_total,
                computed_total = computed,
                "Request total size not equal to calculated total size"
            );
            return Err(StoreError::SizeMismatch {
                requested: requested_total,
                computed,
            });
        }

        let mut buffer = Vec::with_capacity(computed as usize);
        for fragment in &fragments {
            let bytes = self.registry.read(&fragment.key).await?;
            buffer.extend_from_slice(&bytes);
            self.registry.remove(&fragment.key).await?;
        }

        let object = self.registry.write(base, buffer, None).await;

        tracing::info!(
            base = %base,
            fragments = fragments.len(),
            size = object.size,
            "File assembled"
        );

        Ok(object)
    }

    /// Ordered chunk metadata for `base`
    pub async fn chunk_info(&self, base: &str) -> Result<Vec<ChunkInfo>, StoreError> {
        validate_base_name(base)?;
        discover(&self.registry, base, self.max_chunks).await
    }
}

// ============================================================================
// Tests
// ============================================================================
