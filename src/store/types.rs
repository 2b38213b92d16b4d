//! Store types

use std::path::PathBuf;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Suffix appended to every fragment key
pub const CHUNK_SUFFIX: &str = "chunk";

/// Default upper bound on the contiguous fragment scan
pub const DEFAULT_MAX_CHUNKS: u64 = 10_000;

// ============================================================================
// Stored Objects
// ============================================================================

/// Where the bytes of a stored object live
#[derive(Debug, Clone)]
pub enum Content {
    /// Owned buffer held in memory
    Memory(Bytes),

    /// File on disk, read on demand and never cached
    Disk(PathBuf),
}

impl Content {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Content::Disk(path) => Some(path),
            Content::Memory(_) => None,
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Memory(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Memory(Bytes::from(bytes))
    }
}

impl From<PathBuf> for Content {
    fn from(path: PathBuf) -> Self {
        Content::Disk(path)
    }
}

/// One registry entry
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Registry key: a final filename or a fragment key
    pub name: String,

    pub content: Content,

    /// Byte length recorded at write time
    pub size: u64,

    /// Observability only, never used for eviction
    pub created_at: Instant,
}

impl StoredObject {
    /// Build an entry, letting a buffer's real length win over the declared size.
    pub fn new(name: impl Into<String>, content: Content, declared_size: Option<u64>) -> Self {
        let size = match &content {
            Content::Memory(bytes) => bytes.len() as u64,
            Content::Disk(_) => declared_size.unwrap_or(0),
        };

        Self {
            name: name.into(),
            content,
            size,
            created_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

// ============================================================================
// Chunk Info
// ============================================================================

/// Per-fragment metadata reported to progress queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    /// 1-based fragment index
    pub index: u64,

    pub size: u64,

    /// Upload chunk size; equal to `size` for stored fragments
    pub chunk_size: u64,
}

impl ChunkInfo {
    pub fn new(index: u64, size: u64) -> Self {
        Self {
            index,
            size,
            chunk_size: size,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Size mismatch: requested {requested}, computed {computed}")]
    SizeMismatch { requested: u64, computed: u64 },

    #[error("IO error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid chunk index: {0} (indices start at 1)")]
    InvalidChunkIndex(u64),

    #[error("Invalid base name: {0} is itself a chunk key")]
    InvalidName(String),
}

impl StoreError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SizeMismatch { .. } => StatusCode::PRECONDITION_FAILED,
            Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidChunkIndex(_) => StatusCode::BAD_REQUEST,
            Self::InvalidName(_) => StatusCode::BAD_REQUEST,
        }
    }
}
