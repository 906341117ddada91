//! Backpressure-aware stream writer.
//!
//! ```text
//! ┌──────────────┐  submit(chunk) ─► saturated? ──no──► next chunk
//! │StreamTransfer│                        │
//! └──────────────┘                       yes
//!        ▲                                ▼
//!        └──────────── drained().await ◄──┘
//! ```
//!
//! The writer never submits while the sink reports saturation: after a
//! `submit` returns `true` the next submission happens only once
//! [`ChunkSink::drained`] has resolved. Sinks that fail abort the transfer;
//! whatever already reached the destination stays there.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use ssdbench_core::error::{Error, IoResultExt, Result};

/// Destination of a chunked byte stream.
#[async_trait]
pub trait ChunkSink: Send {
    /// Accept a chunk without blocking. Returns `true` when the sink's
    /// internal buffer is saturated and the producer must wait for a drain.
    fn submit(&mut self, chunk: Bytes) -> Result<bool>;

    /// Resolves once buffered data has been handed to the destination.
    async fn drained(&mut self) -> Result<()>;

    /// Flush everything and release the destination. Returns bytes written.
    async fn close(&mut self) -> Result<u64>;
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub bytes_written: u64,
    pub chunks: u64,
    pub saturation_waits: u64,
}

/// One write-a-whole-object operation.
#[derive(Debug, Clone)]
pub struct StreamTransfer {
    total_size: u64,
    chunk_size: usize,
    progress: u64,
    fill: u8,
}

impl StreamTransfer {
    pub fn new(total_size: u64, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration {
                message: "chunk_size must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            total_size,
            chunk_size,
            progress: 0,
            fill: b'X',
        })
    }

    /// Byte used to fill every chunk
    pub fn with_fill(mut self, fill: u8) -> Self {
        self.fill = fill;
        self
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.progress == self.total_size
    }

    /// Drive the transfer to completion, then close the sink.
    pub async fn run<S: ChunkSink + ?Sized>(&mut self, sink: &mut S) -> Result<StreamStats> {
        let template_len = (self.chunk_size as u64).min(self.total_size) as usize;
        let template = Bytes::from(vec![self.fill; template_len]);
        let mut stats = StreamStats::default();

        while self.progress < self.total_size {
            let remaining = self.total_size - self.progress;
            let bytes_to_write = remaining.min(self.chunk_size as u64) as usize;

            let saturated = sink.submit(template.slice(..bytes_to_write))?;
            self.progress += bytes_to_write as u64;
            stats.chunks += 1;

            if saturated {
                stats.saturation_waits += 1;
                sink.drained().await?;
            }
        }

        stats.bytes_written = sink.close().await?;
        debug!(
            total = self.total_size,
            chunks = stats.chunks,
            waits = stats.saturation_waits,
            "Stream transfer complete"
        );
        Ok(stats)
    }
}

/// Write `total_size` bytes to `sink` in chunks of at most `chunk_size`.
pub async fn write_stream<S: ChunkSink + ?Sized>(
    sink: &mut S,
    total_size: u64,
    chunk_size: usize,
) -> Result<StreamStats> {
    StreamTransfer::new(total_size, chunk_size)?.run(sink).await
}

/// File-backed sink with a bounded in-memory buffer.
///
/// Submitted chunks queue up until `high_water_mark` buffered bytes are
/// reached; [`ChunkSink::drained`] then writes the queue to the file.
pub struct FileSink {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    pending: VecDeque<Bytes>,
    buffered: usize,
    high_water_mark: usize,
    written: u64,
}

impl FileSink {
    /// Create (or truncate) the file at `path`.
    pub async fn create(path: impl AsRef<Path>, high_water_mark: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::File::create(&path).await.with_path("create", &path)?;
        Ok(Self {
            path,
            file: Some(file),
            pending: VecDeque::new(),
            buffered: 0,
            high_water_mark: high_water_mark.max(1),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes accepted but not yet handed to the file
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    fn closed_error(&self) -> Error {
        Error::io(
            format!("sink for {:?} already closed", self.path),
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed"),
        )
    }
}

#[async_trait]
impl ChunkSink for FileSink {
    fn submit(&mut self, chunk: Bytes) -> Result<bool> {
        if self.file.is_none() {
            return Err(self.closed_error());
        }
        self.buffered += chunk.len();
        self.pending.push_back(chunk);
        Ok(self.buffered >= self.high_water_mark)
    }

    async fn drained(&mut self) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(self.closed_error());
        };
        while let Some(chunk) = self.pending.pop_front() {
            file.write_all(&chunk).await.with_path("write", &self.path)?;
            self.buffered -= chunk.len();
            self.written += chunk.len() as u64;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<u64> {
        self.drained().await?;
        if let Some(mut file) = self.file.take() {
            file.flush().await.with_path("flush", &self.path)?;
        }
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MIB: usize = 1024 * 1024;

    /// Sink that saturates at a fixed number of buffered bytes and records
    /// every submission made while saturated.
    struct CountingSink {
        capacity: usize,
        buffered: usize,
        saturated: bool,
        received: Vec<u8>,
        submissions: u64,
        violations: u64,
        drains: u64,
        fail_on: Option<u64>,
        closed: bool,
    }

    impl CountingSink {
        fn new(capacity: usize) -> Self {
            Self {
                capacity,
                buffered: 0,
                saturated: false,
                received: Vec::new(),
                submissions: 0,
                violations: 0,
                drains: 0,
                fail_on: None,
                closed: false,
            }
        }
    }

    #[async_trait]
    impl ChunkSink for CountingSink {
        fn submit(&mut self, chunk: Bytes) -> Result<bool> {
            self.submissions += 1;
            if self.saturated {
                self.violations += 1;
            }
            if self.fail_on == Some(self.submissions) {
                return Err(Error::io(
                    "injected",
                    std::io::Error::new(std::io::ErrorKind::Other, "device error"),
                ));
            }
            self.buffered += chunk.len();
            self.received.extend_from_slice(&chunk);
            self.saturated = self.buffered >= self.capacity;
            Ok(self.saturated)
        }

        async fn drained(&mut self) -> Result<()> {
            tokio::task::yield_now().await;
            self.drains += 1;
            self.buffered = 0;
            self.saturated = false;
            Ok(())
        }

        async fn close(&mut self) -> Result<u64> {
            self.closed = true;
            Ok(self.received.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_exact_size_and_submission_count() {
        for (total, chunk) in [(0u64, 4usize), (1, 4), (4, 4), (5, 4), (4096 + 3, 1024)] {
            let mut sink = CountingSink::new(usize::MAX);
            let stats = write_stream(&mut sink, total, chunk).await.unwrap();

            assert_eq!(sink.received.len() as u64, total);
            assert_eq!(stats.bytes_written, total);
            assert_eq!(sink.submissions, total.div_ceil(chunk as u64));
            assert_eq!(stats.chunks, sink.submissions);
            assert!(sink.closed);
        }
    }

    #[tokio::test]
    async fn test_never_submits_while_saturated() {
        // Saturates after every second chunk.
        let mut sink = CountingSink::new(2 * 1024);
        let stats = write_stream(&mut sink, 10 * 1024 + 100, 1024).await.unwrap();

        assert_eq!(sink.violations, 0);
        assert_eq!(stats.saturation_waits, sink.drains);
        assert_eq!(sink.drains, 5);
        assert_eq!(sink.received.len(), 10 * 1024 + 100);
    }

    #[tokio::test]
    async fn test_sink_error_aborts_transfer() {
        let mut sink = CountingSink::new(usize::MAX);
        sink.fail_on = Some(3);

        let mut transfer = StreamTransfer::new(10 * 1024, 1024).unwrap();
        let err = transfer.run(&mut sink).await.unwrap_err();

        assert!(err.is_io());
        assert_eq!(sink.submissions, 3);
        assert_eq!(transfer.progress(), 2 * 1024);
        assert!(!transfer.is_complete());
        assert!(!sink.closed);
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let mut sink = CountingSink::new(1);
        let err = write_stream(&mut sink, 10, 0).await.unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert_eq!(sink.submissions, 0);
    }

    #[tokio::test]
    async fn test_file_sink_writes_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("large_0.csv");
        let total = 3 * MIB as u64 + 17;

        let mut sink = FileSink::create(&path, 16 * 1024).await.unwrap();
        let stats = write_stream(&mut sink, total, MIB).await.unwrap();

        assert_eq!(stats.bytes_written, total);
        assert_eq!(stats.chunks, 4);
        // The 17-byte tail stays under the mark and is flushed by close().
        assert_eq!(stats.saturation_waits, 3);
        assert_eq!(sink.buffered(), 0);

        let data = tokio::fs::read(&path).await.unwrap();
        assert_eq!(data.len() as u64, total);
        assert!(data.iter().all(|&b| b == b'X'));
    }

    #[tokio::test]
    async fn test_file_sink_rejects_after_close() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::create(dir.path().join("x.bin"), 8).await.unwrap();
        assert_eq!(sink.close().await.unwrap(), 0);
        assert!(sink.submit(Bytes::from_static(b"late")).is_err());
    }

    #[tokio::test]
    async fn test_transfer_smaller_than_chunk() {
        let mut sink = CountingSink::new(usize::MAX);
        let stats = write_stream(&mut sink, 10, MIB).await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(sink.received, vec![b'X'; 10]);

        let mut empty = CountingSink::new(usize::MAX);
        let stats = write_stream(&mut empty, 0, MIB).await.unwrap();
        assert_eq!(stats.chunks, 0);
        assert!(empty.closed);
    }

    #[tokio::test]
    async fn test_custom_fill() {
        let mut sink = CountingSink::new(usize::MAX);
        StreamTransfer::new(10, 3)
            .unwrap()
            .with_fill(b'7')
            .run(&mut sink)
            .await
            .unwrap();
        assert_eq!(sink.received, vec![b'7'; 10]);
    }
}
