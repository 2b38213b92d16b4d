//! Slow ingestion
//!
//! Lets a client ask the server to consume an upload slowly, in slices of
//! `chunkSize` bytes with `wait` milliseconds between them, so upload
//! progress handling can be exercised. Only the calling request is delayed.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::multipart::Field;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::AppError;

/// Query parameters controlling ingestion speed
#[derive(Debug, Clone, Default)]
pub struct ThrottleParams {
    /// Milliseconds to pause
    pub wait: Option<u64>,

    /// Slice size in bytes
    pub chunk_size: Option<usize>,
}

/// Ingestion pacing for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    chunk_size: Option<usize>,
    wait: Duration,
}

impl Throttle {
    pub fn new(chunk_size: Option<usize>, wait: Duration) -> Self {
        Self {
            chunk_size: chunk_size.filter(|size| *size > 0),
            wait,
        }
    }

    pub fn from_params(params: &ThrottleParams) -> Self {
        Self::new(params.chunk_size, Duration::from_millis(params.wait.unwrap_or(0)))
    }

    /// No slicing and no waiting
    pub fn is_passthrough(&self) -> bool {
        self.chunk_size.is_none() && self.wait.is_zero()
    }

    /// Pause for the configured wait, if any
    pub async fn pause(&self) {
        if !self.wait.is_zero() {
            tokio::time::sleep(self.wait).await;
        }
    }

    /// Write one received piece to `sink`, pacing it as configured.
    ///
    /// With a slice size, every full slice is followed by a pause and a short
    /// tail is written without one. Without a slice size the whole piece is
    /// written and then the pause applies.
    pub async fn feed<W>(&self, mut piece: Bytes, sink: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(chunk_size) = self.chunk_size else {
            sink.write_all(&piece).await?;
            self.pause().await;
            return Ok(());
        };

        while piece.len() >= chunk_size {
            let slice = piece.split_to(chunk_size);
            sink.write_all(&slice).await?;
            self.pause().await;
        }
        if !piece.is_empty() {
            sink.write_all(&piece).await?;
        }
        Ok(())
    }

    /// Drain a multipart field into `sink`, returning the bytes written
    pub async fn ingest<W>(&self, field: &mut Field<'_>, sink: &mut W) -> Result<u64, AppError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(piece) = field.chunk().await? {
            written += piece.len() as u64;
            if self.is_passthrough() {
                sink.write_all(&piece).await?;
            } else {
                self.feed(piece, sink).await?;
            }
        }
        sink.flush().await?;
        Ok(written)
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(None, Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_passthrough() {
        assert!(Throttle::default().is_passthrough());
        assert!(Throttle::new(Some(0), Duration::ZERO).is_passthrough());
        assert!(!Throttle::new(Some(10), Duration::ZERO).is_passthrough());
    }

    #[test]
    fn test_from_params() {
        let params = ThrottleParams {
            wait: Some(100),
            chunk_size: Some(100),
        };
        let throttle = Throttle::from_params(&params);
        assert_eq!(throttle, Throttle::new(Some(100), Duration::from_millis(100)));
        assert!(!throttle.is_passthrough());
    }

    #[tokio::test]
    async fn test_feed_preserves_bytes() {
        let throttle = Throttle::new(Some(3), Duration::ZERO);
        let mut sink = Vec::new();

        throttle.feed(Bytes::from_static(b"abcdefgh"), &mut sink).await.unwrap();
        throttle.feed(Bytes::from_static(b"ij"), &mut sink).await.unwrap();

        assert_eq!(sink, b"abcdefghij");
    }

    #[tokio::test]
    async fn test_feed_waits_per_slice() {
        let throttle = Throttle::new(Some(100), Duration::from_millis(20));
        let mut sink = Vec::new();

        let start = Instant::now();
        throttle.feed(Bytes::from(vec![7u8; 350]), &mut sink).await.unwrap();

        // Three full slices, three pauses
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(sink.len(), 350);
    }
}
