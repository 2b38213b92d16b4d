//! File service
//!
//! The operations the HTTP layer calls. Expected outcomes (found, not found,
//! size mismatch) come back as one enum per operation; only IO failures and
//! malformed names or indices surface as `Err`.

use axum::body::Bytes;
use axum::http::StatusCode;

use crate::store::chunks::{chunk_key, validate_base_name, validate_chunk_index};
use crate::store::{Assembler, ChunkInfo, Content, Registry, StoreError};

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeOutcome {
    Found { size: u64 },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found { name: String, bytes: Bytes },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored { key: String, size: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleOutcome {
    Assembled { size: u64 },
    SizeMismatch { requested: u64, computed: u64 },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkInfoOutcome {
    Found(Vec<ChunkInfo>),
    NotFound,
}

impl SizeOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Found { .. } => StatusCode::OK,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl ReadOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Found { .. } => StatusCode::OK,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl WriteOutcome {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }
}

impl AssembleOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Assembled { .. } => StatusCode::OK,
            Self::SizeMismatch { .. } => StatusCode::PRECONDITION_FAILED,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl RemoveOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Removed => StatusCode::OK,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl ChunkInfoOutcome {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Found(_) => StatusCode::OK,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

// ============================================================================
// File Service
// ============================================================================

/// Entry point for file operations, cheap to clone
#[derive(Clone)]
pub struct FileService {
    registry: Registry,
    assembler: Assembler,
}

impl FileService {
    pub fn new(max_chunks: u64) -> Self {
        let registry = Registry::new();
        let assembler = Assembler::new(registry.clone(), max_chunks);
        Self {
            registry,
            assembler,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn get_size(&self, name: &str) -> SizeOutcome {
        match self.registry.size(name).await {
            Ok(size) => {
                tracing::debug!(filename = %name, size = size, "Request size");
                SizeOutcome::Found { size }
            }
            Err(_) => {
                tracing::debug!(filename = %name, "Request size not found");
                SizeOutcome::NotFound
            }
        }
    }

    pub async fn read_file(&self, name: &str) -> Result<ReadOutcome, StoreError> {
        match self.registry.read(name).await {
            Ok(bytes) => {
                tracing::debug!(filename = %name, size = bytes.len(), "Streaming");
                Ok(ReadOutcome::Found {
                    name: name.to_string(),
                    bytes,
                })
            }
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(filename = %name, "Streaming not found");
                Ok(ReadOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Store a whole file, in memory or as a reference to a file on disk
    pub async fn write_file(
        &self,
        name: &str,
        content: impl Into<Content>,
        declared_size: Option<u64>,
    ) -> WriteOutcome {
        tracing::debug!(filename = %name, "Storing");
        let object = self.registry.write(name, content, declared_size).await;
        WriteOutcome::Stored {
            key: object.name.clone(),
            size: object.size,
        }
    }

    pub async fn write_chunk(
        &self,
        name: &str,
        bytes: Bytes,
        chunk_index: u64,
    ) -> Result<WriteOutcome, StoreError> {
        validate_base_name(name)?;
        validate_chunk_index(chunk_index)?;

        tracing::debug!(filename = %name, chunk = chunk_index, size = bytes.len(), "Storing chunk");
        let object = self
            .registry
            .write(&chunk_key(name, chunk_index), bytes, None)
            .await;

        Ok(WriteOutcome::Stored {
            key: object.name.clone(),
            size: object.size,
        })
    }

    pub async fn assemble_chunks(
        &self,
        name: &str,
        declared_total: u64,
    ) -> Result<AssembleOutcome, StoreError> {
        match self.assembler.assemble(name, declared_total).await {
            Ok(object) => Ok(AssembleOutcome::Assembled { size: object.size }),
            Err(StoreError::SizeMismatch { requested, computed }) => {
                Ok(AssembleOutcome::SizeMismatch { requested, computed })
            }
            Err(StoreError::NotFound(_)) => Ok(AssembleOutcome::NotFound),
            Err(e) => Err(e),
        }
    }

    pub async fn remove_file(&self, name: &str) -> Result<RemoveOutcome, StoreError> {
        match self.registry.remove(name).await {
            Ok(()) => {
                tracing::debug!(filename = %name, "Removing file");
                Ok(RemoveOutcome::Removed)
            }
            Err(StoreError::NotFound(_)) => {
                tracing::error!(filename = %name, "Removing file not found");
                Ok(RemoveOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_chunk_info(&self, name: &str) -> Result<ChunkInfoOutcome, StoreError> {
        match self.assembler.chunk_info(name).await {
            Ok(chunks) => Ok(ChunkInfoOutcome::Found(chunks)),
            Err(StoreError::NotFound(_)) => Ok(ChunkInfoOutcome::NotFound),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
